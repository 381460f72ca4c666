use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;

/// A chunk represent a named object in a sequence. It contains a start and an end (the end is
/// excluded, i.e. the chunk covers `start..end`) and the type of the entity (such as `LOC`, `PER`,
/// etc.).
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chunk {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn new<S: Into<String>>(entity_type: S, start: usize, end: usize) -> Self {
        Chunk {
            entity_type: entity_type.into(),
            start,
            end,
        }
    }

    /// Number of tokens covered by the chunk.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Chunk) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl<S: Into<String>> From<(S, usize, usize)> for Chunk {
    fn from(value: (S, usize, usize)) -> Self {
        Chunk::new(value.0, value.1, value.2)
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.entity_type, self.start, self.end)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
/// The chunks of many sequences, one `Vec` per sequence. The position of a sequence in the outer
/// `Vec` is part of the identity of its chunks: two chunks only match if they come from the same
/// sequence.
pub struct Chunks(Vec<Vec<Chunk>>);

impl Deref for Chunks {
    type Target = Vec<Vec<Chunk>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Vec<Chunk>>> for Chunks {
    fn from(value: Vec<Vec<Chunk>>) -> Self {
        Chunks(value)
    }
}

impl From<&[Vec<Chunk>]> for Chunks {
    fn from(value: &[Vec<Chunk>]) -> Self {
        Chunks(value.to_vec())
    }
}

impl Chunks {
    pub fn new(chunks: Vec<Vec<Chunk>>) -> Self {
        Chunks(chunks)
    }

    #[inline(always)]
    /// Filters the chunks for a given entity type and returns their `(sequence, start, end)`
    /// triplets in a HashSet. Duplicated chunks are only counted once.
    ///
    /// * `entity_type`: Only the chunks whose type is equal to `entity_type` are kept.
    pub fn filter<S: AsRef<str>>(&self, entity_type: S) -> AHashSet<(usize, usize, usize)> {
        let entity_type_ref = entity_type.as_ref();
        self.iter()
            .enumerate()
            .flat_map(|(i, v)| v.iter().map(move |c| (i, c)))
            .filter(|(_, c)| c.entity_type == entity_type_ref)
            .map(|(i, c)| (i, c.start, c.end))
            .collect()
    }

    /// Number of distinct chunks of the given entity type.
    pub fn filter_count<S: AsRef<str>>(&self, entity_type: S) -> usize {
        self.filter(entity_type).len()
    }

    pub fn unique_tags(&self) -> AHashSet<&str> {
        AHashSet::from_iter(
            self.iter()
                .flat_map(|v| v.iter())
                .map(|c| c.entity_type.as_str()),
        )
    }
}
