/**
Sequence tagging decoders. A `DecoderConfig` names the architecture (softmax or CRF), the scheme and
the tag vocabulary; `instantiate` turns it into a `SequenceTaggingDecoder`, which computes the
losses of gold tags and decodes emission scores into tags and chunks.
*/
use crate::batch::{self, BatchError};
use crate::chunk::Chunk;
use crate::crf::{self, Crf, CrfError};
use crate::schemes::{SchemeType, UnknownSchemeError, PAD_TAG};
use crate::translator::{Bio1Begin, ChunksTagsTranslator};
use crate::vocab::{TagVocab, VocabError};
use either::Either as LeftOrRight;
use ndarray::{s, Array1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid decoder architecture `{0}`. Expected `softmax` or `CRF`")]
    UnknownArch(String),
    #[error(transparent)]
    UnknownScheme(#[from] UnknownSchemeError),
    #[error("The decoder needs a tag vocabulary (`idx2tag`)")]
    MissingVocabulary,
    #[error(transparent)]
    Vocab(#[from] VocabError),
    #[error(transparent)]
    Crf(#[from] CrfError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecoderArch {
    /// Independent arg-max of each position, trained with the token cross-entropy.
    Softmax,
    #[default]
    Crf,
}

impl FromStr for DecoderArch {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "softmax" => Ok(Self::Softmax),
            "crf" => Ok(Self::Crf),
            _ => Err(ConfigError::UnknownArch(String::from(s))),
        }
    }
}

impl Display for DecoderArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Softmax => write!(f, "softmax"),
            Self::Crf => write!(f, "CRF"),
        }
    }
}

/// Configuration of a decoder. It is built with a `DecoderConfigBuilder` and only checked when the
/// decoder is instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub arch: DecoderArch,
    pub scheme: SchemeType,
    pub idx2tag: Vec<String>,
    pub bio1_begin: Bio1Begin,
    /// Processes the items of a batch in parallel.
    pub parallel: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            arch: DecoderArch::Crf,
            scheme: SchemeType::BIOES,
            idx2tag: vec![],
            bio1_begin: Bio1Begin::Always,
            parallel: false,
        }
    }
}

impl Display for DecoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Architecture: {}\n Scheme: {}\n Number of tags: {}\n Using parallel computations: {}",
            self.arch,
            self.scheme,
            self.idx2tag.len(),
            self.parallel
        )
    }
}

impl DecoderConfig {
    /// Builds the decoder. Fails if the vocabulary is missing, has duplicated tags or has no
    /// padding tag.
    pub fn instantiate(&self) -> Result<SequenceTaggingDecoder, ConfigError> {
        if self.idx2tag.is_empty() {
            return Err(ConfigError::MissingVocabulary);
        }
        let vocab = TagVocab::new(self.idx2tag.clone(), PAD_TAG)?;
        for tag in vocab.tags() {
            if tag != PAD_TAG && !self.scheme.is_valid_tag(tag) {
                warn!(tag = tag.as_str(), scheme = %self.scheme, "tag will always be read as outside");
            }
        }
        let translator = ChunksTagsTranslator::new(self.scheme).with_bio1_begin(self.bio1_begin);
        let kind = match self.arch {
            DecoderArch::Softmax => DecoderKind::Softmax,
            DecoderArch::Crf => DecoderKind::Crf(
                Crf::new(vocab.len(), Some(vocab.pad_idx()))?.parallel(self.parallel),
            ),
        };
        debug!(arch = %self.arch, scheme = %self.scheme, num_tags = vocab.len(), "instantiated decoder");
        Ok(SequenceTaggingDecoder {
            translator,
            vocab,
            kind,
            parallel: self.parallel,
        })
    }
}

/// This builder can be used to build and customize a `DecoderConfig`. The architecture and the
/// scheme can be given by name; names are parsed by `build`.
#[derive(Debug, Clone)]
pub struct DecoderConfigBuilder {
    arch: LeftOrRight<String, DecoderArch>,
    scheme: LeftOrRight<String, SchemeType>,
    idx2tag: Vec<String>,
    bio1_begin: Bio1Begin,
    parallel: bool,
}

impl Default for DecoderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderConfigBuilder {
    pub fn new() -> Self {
        Self {
            arch: LeftOrRight::Right(DecoderArch::default()),
            scheme: LeftOrRight::Right(SchemeType::BIOES),
            idx2tag: vec![],
            bio1_begin: Bio1Begin::default(),
            parallel: false,
        }
    }
    pub fn arch(mut self, arch: DecoderArch) -> Self {
        self.arch = LeftOrRight::Right(arch);
        self
    }
    pub fn arch_name<S: Into<String>>(mut self, arch: S) -> Self {
        self.arch = LeftOrRight::Left(arch.into());
        self
    }
    pub fn scheme(mut self, scheme: SchemeType) -> Self {
        self.scheme = LeftOrRight::Right(scheme);
        self
    }
    pub fn scheme_name<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = LeftOrRight::Left(scheme.into());
        self
    }
    pub fn idx2tag<S: AsRef<str>>(mut self, idx2tag: &[S]) -> Self {
        self.idx2tag = idx2tag.iter().map(|t| String::from(t.as_ref())).collect();
        self
    }
    pub fn bio1_begin(mut self, bio1_begin: Bio1Begin) -> Self {
        self.bio1_begin = bio1_begin;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn build(self) -> Result<DecoderConfig, ConfigError> {
        let arch = match self.arch {
            LeftOrRight::Left(name) => DecoderArch::from_str(&name)?,
            LeftOrRight::Right(arch) => arch,
        };
        let scheme = match self.scheme {
            LeftOrRight::Left(name) => SchemeType::from_str(&name)?,
            LeftOrRight::Right(scheme) => scheme,
        };
        Ok(DecoderConfig {
            arch,
            scheme,
            idx2tag: self.idx2tag,
            bio1_begin: self.bio1_begin,
            parallel: self.parallel,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DecoderKind {
    Softmax,
    Crf(Crf),
}

/// Decoder built from a `DecoderConfig`. Emission scores (`logits`) are `(batch, max_len,
/// num_tags)` arrays and masks `(batch, max_len)` arrays whose rows are a prefix of `true` values.
#[derive(Debug, Clone)]
pub struct SequenceTaggingDecoder {
    translator: ChunksTagsTranslator,
    vocab: TagVocab,
    kind: DecoderKind,
    parallel: bool,
}

impl SequenceTaggingDecoder {
    pub fn arch(&self) -> DecoderArch {
        match self.kind {
            DecoderKind::Softmax => DecoderArch::Softmax,
            DecoderKind::Crf(_) => DecoderArch::Crf,
        }
    }

    pub fn vocab(&self) -> &TagVocab {
        &self.vocab
    }

    pub fn translator(&self) -> &ChunksTagsTranslator {
        &self.translator
    }

    pub fn crf(&self) -> Option<&Crf> {
        match &self.kind {
            DecoderKind::Crf(crf) => Some(crf),
            DecoderKind::Softmax => None,
        }
    }

    pub fn crf_mut(&mut self) -> Option<&mut Crf> {
        match &mut self.kind {
            DecoderKind::Crf(crf) => Some(crf),
            DecoderKind::Softmax => None,
        }
    }

    /// Loss of each item of the batch.
    ///
    /// * `logits`: Emission scores
    /// * `gold`: Gold tag indices of each item, of the true length of the item
    /// * `mask`: Mask of the real positions
    pub fn forward(
        &self,
        logits: ArrayView3<f32>,
        gold: &[Vec<usize>],
        mask: ArrayView2<bool>,
    ) -> Result<Array1<f32>, BatchError> {
        let lengths = batch::check_emissions(logits, mask, self.vocab.len())?;
        if gold.len() != lengths.len() {
            return Err(BatchError::ShapeMismatch {
                what: "gold sequences",
                expected: vec![lengths.len()],
                found: vec![gold.len()],
            });
        }
        for (item, (tags, &len)) in gold.iter().zip(&lengths).enumerate() {
            if tags.len() != len {
                return Err(BatchError::ShapeMismatch {
                    what: "gold sequence",
                    expected: vec![item, len],
                    found: vec![item, tags.len()],
                });
            }
        }
        match &self.kind {
            DecoderKind::Crf(crf) => {
                let padded =
                    batch::pad_tag_ids(gold, logits.len_of(Axis(1)), self.vocab.pad_idx())?;
                crf.forward(logits, padded.view(), mask)
            }
            DecoderKind::Softmax => {
                for (item, tags) in gold.iter().enumerate() {
                    batch::check_tags(item, tags, self.vocab.len(), None)?;
                }
                let pad_idx = self.vocab.pad_idx();
                let cross_entropy = |item: usize| {
                    gold[item]
                        .iter()
                        .enumerate()
                        .filter(|(_, tag)| **tag != pad_idx)
                        .map(|(position, &tag)| {
                            let row = logits.slice(s![item, position, ..]);
                            crf::log_sum_exp(row) - row[tag]
                        })
                        .sum::<f32>()
                };
                let losses: Vec<f32> = if self.parallel {
                    (0..gold.len()).into_par_iter().map(cross_entropy).collect()
                } else {
                    (0..gold.len()).map(cross_entropy).collect()
                };
                Ok(Array1::from_vec(losses))
            }
        }
    }

    /// Best tag indices of each item, of the true length of the item.
    pub fn decode_ids(
        &self,
        logits: ArrayView3<f32>,
        mask: ArrayView2<bool>,
    ) -> Result<Vec<Vec<usize>>, BatchError> {
        match &self.kind {
            DecoderKind::Crf(crf) => crf.decode(logits, mask),
            DecoderKind::Softmax => {
                let lengths = batch::check_emissions(logits, mask, self.vocab.len())?;
                let best = |item: usize| {
                    logits
                        .slice(s![item, ..lengths[item], ..])
                        .outer_iter()
                        .map(|row| crf::argmax(row).0)
                        .collect::<Vec<usize>>()
                };
                let paths = if self.parallel {
                    (0..lengths.len()).into_par_iter().map(best).collect()
                } else {
                    (0..lengths.len()).map(best).collect()
                };
                Ok(paths)
            }
        }
    }

    /// Best tags of each item.
    pub fn decode(
        &self,
        logits: ArrayView3<f32>,
        mask: ArrayView2<bool>,
    ) -> Result<Vec<Vec<String>>, BatchError> {
        Ok(self
            .decode_ids(logits, mask)?
            .iter()
            .map(|ids| self.vocab.decode(ids))
            .collect())
    }

    /// Chunks of the best tags of each item. Ill-formed predictions are repaired.
    pub fn decode_chunks(
        &self,
        logits: ArrayView3<f32>,
        mask: ArrayView2<bool>,
    ) -> Result<Vec<Vec<Chunk>>, BatchError> {
        Ok(self
            .decode_ids(logits, mask)?
            .iter()
            .map(|ids| self.translator.tag_ids2chunks(ids, &self.vocab))
            .collect())
    }
}
