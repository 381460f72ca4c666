use crate::schemes::{SchemeType, PAD_TAG};
use ahash::{AHashMap, AHashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VocabError {
    #[error("Tag `{0}` appears more than once in the vocabulary")]
    DuplicateTag(String),
    #[error("The padding tag `{0}` is not part of the vocabulary")]
    MissingPadTag(String),
    #[error("Tag `{0}` is not part of the vocabulary")]
    UnknownTag(String),
}

/// Bidirectional mapping between tags and their indices. The padding tag always has an index, and
/// that index is never a valid label for a real token.
#[derive(Debug, Clone)]
pub struct TagVocab {
    idx2tag: Vec<String>,
    tag2idx: AHashMap<String, usize>,
    pad_idx: usize,
}

impl PartialEq for TagVocab {
    fn eq(&self, other: &Self) -> bool {
        self.idx2tag == other.idx2tag && self.pad_idx == other.pad_idx
    }
}

impl TagVocab {
    /// Builds a vocabulary from the tags, indexed by their position in `idx2tag`.
    ///
    /// * `idx2tag`: Every tag, padding tag included. Tags must be unique.
    /// * `pad_tag`: Tag used for padding
    pub fn new(idx2tag: Vec<String>, pad_tag: &str) -> Result<Self, VocabError> {
        let mut tag2idx = AHashMap::with_capacity(idx2tag.len());
        for (i, tag) in idx2tag.iter().enumerate() {
            if tag2idx.insert(tag.clone(), i).is_some() {
                return Err(VocabError::DuplicateTag(tag.clone()));
            }
        }
        let pad_idx = *tag2idx
            .get(pad_tag)
            .ok_or_else(|| VocabError::MissingPadTag(String::from(pad_tag)))?;
        Ok(TagVocab {
            idx2tag,
            tag2idx,
            pad_idx,
        })
    }

    /// Vocabulary of every tag the scheme can produce for the given entity types. The padding tag
    /// gets index 0 and the outside tag index 1.
    pub fn from_entity_types<S: AsRef<str>>(scheme: SchemeType, entity_types: &[S]) -> Self {
        let mut idx2tag = vec![String::from(PAD_TAG)];
        idx2tag.extend(scheme.tags_for(entity_types));
        let tag2idx = idx2tag
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        TagVocab {
            idx2tag,
            tag2idx,
            pad_idx: 0,
        }
    }

    /// Vocabulary of the tags observed in `sequences`, after the padding and outside tags. Observed
    /// tags are sorted, so the same data always yields the same indices.
    pub fn build<S: AsRef<str>>(sequences: &[Vec<S>], scheme: SchemeType) -> Self {
        let outside = scheme.outside_tag();
        let observed: AHashSet<&str> = sequences
            .iter()
            .flat_map(|s| s.iter().map(|t| t.as_ref()))
            .filter(|t| *t != PAD_TAG && *t != outside)
            .collect();
        let mut observed: Vec<&str> = observed.into_iter().collect();
        observed.sort_unstable();
        let idx2tag: Vec<String> = [PAD_TAG, outside]
            .into_iter()
            .chain(observed)
            .map(String::from)
            .collect();
        debug!(size = idx2tag.len(), %scheme, "built tag vocabulary");
        let tag2idx = idx2tag
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        TagVocab {
            idx2tag,
            tag2idx,
            pad_idx: 0,
        }
    }

    /// Number of tags, padding tag included.
    pub fn len(&self) -> usize {
        self.idx2tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2tag.is_empty()
    }

    pub fn pad_idx(&self) -> usize {
        self.pad_idx
    }

    pub fn idx2tag(&self, idx: usize) -> Option<&str> {
        self.idx2tag.get(idx).map(|t| t.as_str())
    }

    pub fn tag2idx(&self, tag: &str) -> Option<usize> {
        self.tag2idx.get(tag).copied()
    }

    pub fn tags(&self) -> &[String] {
        &self.idx2tag
    }

    /// Converts tags into indices. Fails on the first unknown tag.
    pub fn encode<S: AsRef<str>>(&self, tags: &[S]) -> Result<Vec<usize>, VocabError> {
        tags.iter()
            .map(|t| {
                self.tag2idx(t.as_ref())
                    .ok_or_else(|| VocabError::UnknownTag(String::from(t.as_ref())))
            })
            .collect()
    }

    /// Converts indices into tags. Unknown indices become the padding tag.
    pub fn decode(&self, tag_ids: &[usize]) -> Vec<String> {
        tag_ids
            .iter()
            .map(|&i| String::from(self.idx2tag(i).unwrap_or(PAD_TAG)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vocab() {
        let tags = vec!["O", "<pad>", "B-PER"]
            .into_iter()
            .map(String::from)
            .collect();
        let vocab = TagVocab::new(tags, PAD_TAG).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.pad_idx(), 1);
        assert_eq!(vocab.tag2idx("B-PER"), Some(2));
        assert_eq!(vocab.idx2tag(0), Some("O"));
        assert_eq!(vocab.idx2tag(3), None);
    }

    #[test]
    fn test_new_vocab_errors() {
        let duplicated = vec!["<pad>", "O", "O"].into_iter().map(String::from).collect();
        assert_eq!(
            TagVocab::new(duplicated, PAD_TAG),
            Err(VocabError::DuplicateTag(String::from("O")))
        );
        let no_pad = vec!["O", "B-PER"].into_iter().map(String::from).collect();
        assert_eq!(
            TagVocab::new(no_pad, PAD_TAG),
            Err(VocabError::MissingPadTag(String::from(PAD_TAG)))
        );
    }

    #[test]
    fn test_from_entity_types() {
        let vocab = TagVocab::from_entity_types(SchemeType::BIOES, &["PER"]);
        assert_eq!(
            vocab.tags(),
            &["<pad>", "O", "B-PER", "I-PER", "E-PER", "S-PER"]
        );
        assert_eq!(vocab.pad_idx(), 0);
    }

    #[test]
    fn test_build_sorts_observed_tags() {
        let sequences = vec![vec!["O", "B-PER", "I-PER"], vec!["B-LOC", "O", "<pad>"]];
        let vocab = TagVocab::build(&sequences, SchemeType::BIO2);
        assert_eq!(
            vocab.tags(),
            &["<pad>", "O", "B-LOC", "B-PER", "I-PER"]
        );
    }

    #[test]
    fn test_encode_decode() {
        let vocab = TagVocab::from_entity_types(SchemeType::BIO2, &["PER"]);
        let ids = vocab.encode(&["B-PER", "I-PER", "O"]).unwrap();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(vocab.decode(&ids), vec!["B-PER", "I-PER", "O"]);
        assert_eq!(vocab.decode(&[42]), vec!["<pad>"]);
        assert_eq!(
            vocab.encode(&["S-PER"]),
            Err(VocabError::UnknownTag(String::from("S-PER")))
        );
    }
}
