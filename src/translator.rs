/**
This module converts tag sequences into chunks and chunks into tag sequences. Converting tags into
chunks never fails: predicted sequences are not guaranteed to respect the grammar of a scheme, so
ill-formed tags are repaired instead of rejected.
*/
use crate::chunk::Chunk;
use crate::schemes::{Marker, Position, SchemeType, UnknownSchemeError};
use crate::vocab::TagVocab;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace};

/// Where does a BIO1 chunk get its `B` marker? Both conventions are found in the wild, and both
/// are read back identically by `tags2chunks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bio1Begin {
    /// Every chunk starts with `B`, exactly like BIO2.
    #[default]
    Always,
    /// Classic IOB1: chunks start with `I`, except a chunk starting right where a chunk of the same
    /// type ends.
    AfterSameType,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("Chunk {0} is empty")]
    EmptyChunk(Chunk),
    #[error("Chunk {chunk} ends after the end of the sequence (length {len})")]
    OutOfRange { chunk: Chunk, len: usize },
    #[error("Chunks {0} and {1} overlap")]
    Overlap(Chunk, Chunk),
}

/// Converts chunks into tags and tags into chunks for a given scheme. The translator is immutable:
/// changing the scheme means building a new translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunksTagsTranslator {
    scheme: SchemeType,
    bio1_begin: Bio1Begin,
}

impl From<SchemeType> for ChunksTagsTranslator {
    fn from(value: SchemeType) -> Self {
        Self::new(value)
    }
}

impl FromStr for ChunksTagsTranslator {
    type Err = UnknownSchemeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(SchemeType::from_str(s)?))
    }
}

impl ChunksTagsTranslator {
    pub fn new(scheme: SchemeType) -> Self {
        debug!(%scheme, "building chunks/tags translator");
        ChunksTagsTranslator {
            scheme,
            bio1_begin: Bio1Begin::default(),
        }
    }

    /// Sets the BIO1 begin policy. It has no effect on the other schemes.
    pub fn with_bio1_begin(mut self, policy: Bio1Begin) -> Self {
        self.bio1_begin = policy;
        self
    }

    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }

    pub fn bio1_begin(&self) -> Bio1Begin {
        self.bio1_begin
    }

    /// Builds the tags of a sequence of length `len` from its chunks. The chunks can be given in
    /// any order, but they must be non-empty, inside the sequence and disjoint.
    ///
    /// * `chunks`: Chunks of the sequence
    /// * `len`: Length of the sequence
    pub fn chunks2tags(&self, chunks: &[Chunk], len: usize) -> Result<Vec<String>, TranslationError> {
        let mut sorted: Vec<&Chunk> = chunks.iter().collect();
        sorted.sort_by_key(|c| (c.start, c.end));
        let mut previous: Option<&Chunk> = None;
        for chunk in sorted.iter() {
            if chunk.is_empty() {
                return Err(TranslationError::EmptyChunk((*chunk).clone()));
            }
            if chunk.end > len {
                return Err(TranslationError::OutOfRange {
                    chunk: (*chunk).clone(),
                    len,
                });
            }
            if let Some(prev) = previous {
                if prev.overlaps(chunk) {
                    return Err(TranslationError::Overlap(prev.clone(), (*chunk).clone()));
                }
            }
            previous = Some(chunk);
        }

        let outside = self.scheme.outside_tag();
        let mut tags = vec![String::from(outside); len];
        let mut previous: Option<&Chunk> = None;
        for chunk in sorted {
            let follows_same_type = previous
                .is_some_and(|p| p.end == chunk.start && p.entity_type == chunk.entity_type);
            for (i, tag) in tags[chunk.start..chunk.end].iter_mut().enumerate() {
                let position = self.position_in_chunk(i, chunk.len(), follows_same_type);
                *tag = self.scheme.render(position, &chunk.entity_type);
            }
            previous = Some(chunk);
        }
        Ok(tags)
    }

    fn position_in_chunk(&self, i: usize, len: usize, follows_same_type: bool) -> Position {
        let position = match (i, len) {
            (0, 1) => Position::Single,
            (0, _) => Position::Begin,
            (i, len) if i == len - 1 => Position::End,
            _ => Position::Inside,
        };
        match (self.scheme, self.bio1_begin, position) {
            (SchemeType::BIO1, Bio1Begin::AfterSameType, Position::Begin | Position::Single)
                if !follows_same_type =>
            {
                Position::Inside
            }
            _ => position,
        }
    }

    /// Reads the chunks of a tag sequence. This function is total: tags breaking the grammar of
    /// the scheme are repaired and tags that cannot be read at all are considered outside. The
    /// chunks are returned ordered by their start and never overlap.
    pub fn tags2chunks<S: AsRef<str>>(&self, tags: &[S]) -> Vec<Chunk> {
        let markers = tags.iter().map(|t| self.scheme.parse_tag(t.as_ref()));
        ChunkIter::new(markers).collect()
    }

    /// Same as `tags2chunks`, for tag indices. Indices unknown to `vocab` are read as outside.
    pub fn tag_ids2chunks(&self, tag_ids: &[usize], vocab: &TagVocab) -> Vec<Chunk> {
        let markers = tag_ids.iter().map(|&i| match vocab.idx2tag(i) {
            Some(tag) => self.scheme.parse_tag(tag),
            None => Marker::Outside,
        });
        ChunkIter::new(markers).collect()
    }

    /// Reads the chunks of many sequences. Sequences are independent, so they can be processed in
    /// parallel.
    pub fn batch_tags2chunks<S: AsRef<str> + Sync>(
        &self,
        batch: &[Vec<S>],
        parallel: bool,
    ) -> Vec<Vec<Chunk>> {
        if parallel {
            batch.par_iter().map(|tags| self.tags2chunks(tags)).collect()
        } else {
            batch.iter().map(|tags| self.tags2chunks(tags)).collect()
        }
    }

    /// Builds the tags of many sequences, given as `(chunks, length)` pairs.
    pub fn batch_chunks2tags(
        &self,
        batch: &[(Vec<Chunk>, usize)],
    ) -> Result<Vec<Vec<String>>, TranslationError> {
        batch
            .iter()
            .map(|(chunks, len)| self.chunks2tags(chunks, *len))
            .collect()
    }
}

/// This struct iterates over the markers of a *single* sequence and returns its chunks. The chunk
/// still open when the markers run out is returned last.
struct ChunkIter<'t, I>
where
    I: Iterator<Item = Marker<'t>>,
{
    markers: I,
    /// Type and start of the chunk currently open
    open: Option<(&'t str, usize)>,
    /// Chunk found during the last step, to return after the chunk closed by the same step
    pending: Option<Chunk>,
    index: usize,
}

impl<'t, I> ChunkIter<'t, I>
where
    I: Iterator<Item = Marker<'t>>,
{
    fn new(markers: I) -> Self {
        ChunkIter {
            markers,
            open: None,
            pending: None,
            index: 0,
        }
    }

    fn close(&mut self, end: usize) -> Option<Chunk> {
        self.open
            .take()
            .map(|(entity_type, start)| Chunk::new(entity_type, start, end))
    }

    fn is_open_with(&self, entity_type: &str) -> bool {
        matches!(self.open, Some((t, _)) if t == entity_type)
    }

    /// Consumes the marker at index `i`. Returns the chunk closed by this marker and the single
    /// token chunk it creates, if any.
    fn step(&mut self, marker: Marker<'t>, i: usize) -> (Option<Chunk>, Option<Chunk>) {
        match marker {
            Marker::Outside => (self.close(i), None),
            Marker::Begin(t) => {
                let closed = self.close(i);
                self.open = Some((t, i));
                (closed, None)
            }
            Marker::Inside(Some(t)) if self.is_open_with(t) => (None, None),
            Marker::Inside(Some(t)) => {
                trace!(index = i, entity_type = t, "inside marker starts a new chunk");
                let closed = self.close(i);
                self.open = Some((t, i));
                (closed, None)
            }
            // Extends the open chunk, or stays outside
            Marker::Inside(None) => (None, None),
            Marker::End(Some(t)) if self.is_open_with(t) => (self.close(i + 1), None),
            Marker::End(Some(t)) => {
                trace!(index = i, entity_type = t, "end marker read as a single token chunk");
                (self.close(i), Some(Chunk::new(t, i, i + 1)))
            }
            Marker::End(None) => (self.close(i + 1), None),
            Marker::Single(t) => (self.close(i), Some(Chunk::new(t, i, i + 1))),
        }
    }
}

impl<'t, I> Iterator for ChunkIter<'t, I>
where
    I: Iterator<Item = Marker<'t>>,
{
    type Item = Chunk;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.pending.take() {
                return Some(chunk);
            }
            let Some(marker) = self.markers.next() else {
                return self.close(self.index);
            };
            let i = self.index;
            self.index += 1;
            match self.step(marker, i) {
                (Some(closed), created) => {
                    self.pending = created;
                    return Some(closed);
                }
                (None, Some(created)) => return Some(created),
                (None, None) => continue,
            }
        }
    }
}
