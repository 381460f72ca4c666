/**
Linear-chain conditional random field. The CRF scores tag sequences with the emissions of each
position and a learned transition matrix. It computes the negative log-likelihood of gold sequences
with the forward algorithm and finds the best sequence with Viterbi decoding.

The transition matrix has `num_tags + 2` rows and columns: index `num_tags` is the virtual BEGIN
tag and index `num_tags + 1` the virtual END tag. Rows are the source tag, columns the target tag.
*/
use crate::batch::{self, BatchError};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Score of the transitions that can never happen. It is finite so that the recurrences never
/// produce `NaN`.
pub const IMPOSSIBLE_SCORE: f32 = -1e4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrfError {
    #[error("A CRF needs at least one tag")]
    NoTags,
    #[error("Padding index {pad_idx} is out of range for {num_tags} tags")]
    InvalidPadIndex { pad_idx: usize, num_tags: usize },
    #[error("Transitions must be a {expected}x{expected} matrix, found {rows}x{cols}")]
    TransitionShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
}

/// Parameters of the CRF as they are serialized. Deserialization goes through
/// `Crf::from_transitions`, so the pinned transitions are always restored.
#[derive(Deserialize)]
struct CrfParameters {
    transitions: Array2<f32>,
    pad_idx: Option<usize>,
    #[serde(default)]
    parallel: bool,
}

impl TryFrom<CrfParameters> for Crf {
    type Error = CrfError;
    fn try_from(value: CrfParameters) -> Result<Self, Self::Error> {
        Ok(Crf::from_transitions(value.transitions, value.pad_idx)?.parallel(value.parallel))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CrfParameters")]
pub struct Crf {
    transitions: Array2<f32>,
    #[serde(skip_serializing)]
    num_tags: usize,
    pad_idx: Option<usize>,
    parallel: bool,
}

impl Crf {
    /// Builds a CRF whose transitions are all zero, except the pinned ones.
    ///
    /// * `num_tags`: Number of tags, padding tag included
    /// * `pad_idx`: Index of the padding tag, if any. No transition can enter or leave it.
    pub fn new(num_tags: usize, pad_idx: Option<usize>) -> Result<Self, CrfError> {
        Self::from_transitions(Array2::zeros((num_tags + 2, num_tags + 2)), pad_idx)
    }

    /// Builds a CRF from existing transitions, of shape `(num_tags + 2, num_tags + 2)`. The pinned
    /// transitions are overwritten.
    pub fn from_transitions(
        transitions: Array2<f32>,
        pad_idx: Option<usize>,
    ) -> Result<Self, CrfError> {
        let (rows, cols) = transitions.dim();
        if rows != cols || rows < 2 {
            return Err(CrfError::TransitionShape {
                expected: rows.max(cols).max(3),
                rows,
                cols,
            });
        }
        let num_tags = rows - 2;
        if num_tags == 0 {
            return Err(CrfError::NoTags);
        }
        if let Some(pad_idx) = pad_idx {
            if pad_idx >= num_tags {
                return Err(CrfError::InvalidPadIndex { pad_idx, num_tags });
            }
        }
        debug!(num_tags, ?pad_idx, "building CRF");
        let mut crf = Crf {
            transitions,
            num_tags,
            pad_idx,
            parallel: false,
        };
        crf.pin_impossible_transitions();
        Ok(crf)
    }

    /// Processes the items of a batch in parallel.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    pub fn pad_idx(&self) -> Option<usize> {
        self.pad_idx
    }

    fn begin(&self) -> usize {
        self.num_tags
    }

    fn end(&self) -> usize {
        self.num_tags + 1
    }

    pub fn transitions(&self) -> ArrayView2<'_, f32> {
        self.transitions.view()
    }

    /// Gives mutable access to the transitions, for an optimizer. The pinned transitions are
    /// restored once `update` returns.
    pub fn update_transitions<F>(&mut self, update: F)
    where
        F: FnOnce(ArrayViewMut2<f32>),
    {
        update(self.transitions.view_mut());
        self.pin_impossible_transitions();
    }

    fn pin_impossible_transitions(&mut self) {
        let (begin, end) = (self.begin(), self.end());
        self.transitions.column_mut(begin).fill(IMPOSSIBLE_SCORE);
        self.transitions.row_mut(end).fill(IMPOSSIBLE_SCORE);
        if let Some(pad_idx) = self.pad_idx {
            self.transitions.row_mut(pad_idx).fill(IMPOSSIBLE_SCORE);
            self.transitions.column_mut(pad_idx).fill(IMPOSSIBLE_SCORE);
        }
    }

    /// Score of `tags` for a single unpadded sequence: emissions, transitions between consecutive
    /// tags, and the BEGIN and END transitions.
    pub fn sequence_score(
        &self,
        emissions: ArrayView2<f32>,
        tags: &[usize],
    ) -> Result<f32, BatchError> {
        batch::check_sequence(emissions, self.num_tags)?;
        if tags.len() != emissions.nrows() {
            return Err(BatchError::ShapeMismatch {
                what: "gold tags",
                expected: vec![emissions.nrows()],
                found: vec![tags.len()],
            });
        }
        batch::check_tags(0, tags, self.num_tags, None)?;
        Ok(self.score_unchecked(emissions, tags))
    }

    /// Log of the sum of the exponentiated scores of every tag sequence, for a single unpadded
    /// sequence.
    pub fn log_partition(&self, emissions: ArrayView2<f32>) -> Result<f32, BatchError> {
        batch::check_sequence(emissions, self.num_tags)?;
        Ok(self.log_partition_unchecked(emissions))
    }

    /// Best tag sequence for a single unpadded sequence.
    pub fn viterbi(&self, emissions: ArrayView2<f32>) -> Result<Vec<usize>, BatchError> {
        batch::check_sequence(emissions, self.num_tags)?;
        Ok(self.viterbi_unchecked(emissions))
    }

    /// Negative log-likelihood of the gold tags of each item of the batch. Masked positions are
    /// sliced away before scoring.
    ///
    /// * `emissions`: `(batch, max_len, num_tags)` emission scores
    /// * `gold_tags`: `(batch, max_len)` gold tags. Tags at masked positions are ignored.
    /// * `mask`: `(batch, max_len)` mask, a prefix of `true` values per item
    pub fn forward(
        &self,
        emissions: ArrayView3<f32>,
        gold_tags: ArrayView2<usize>,
        mask: ArrayView2<bool>,
    ) -> Result<Array1<f32>, BatchError> {
        let lengths = batch::check_emissions(emissions, mask, self.num_tags)?;
        batch::check_gold(
            gold_tags,
            &lengths,
            emissions.len_of(Axis(1)),
            self.num_tags,
            self.pad_idx,
        )?;
        let nll = |item: usize| {
            let len = lengths[item];
            let item_emissions = emissions.slice(s![item, ..len, ..]);
            let tags = gold_tags.slice(s![item, ..len]).to_vec();
            self.log_partition_unchecked(item_emissions) - self.score_unchecked(item_emissions, &tags)
        };
        let losses: Vec<f32> = if self.parallel {
            (0..lengths.len()).into_par_iter().map(nll).collect()
        } else {
            (0..lengths.len()).map(nll).collect()
        };
        Ok(Array1::from_vec(losses))
    }

    /// Sum of the negative log-likelihoods of the batch.
    pub fn loss(
        &self,
        emissions: ArrayView3<f32>,
        gold_tags: ArrayView2<usize>,
        mask: ArrayView2<bool>,
    ) -> Result<f32, BatchError> {
        Ok(self.forward(emissions, gold_tags, mask)?.sum())
    }

    /// Best tag sequence of each item of the batch. Each sequence has the true length of its item.
    pub fn decode(
        &self,
        emissions: ArrayView3<f32>,
        mask: ArrayView2<bool>,
    ) -> Result<Vec<Vec<usize>>, BatchError> {
        let lengths = batch::check_emissions(emissions, mask, self.num_tags)?;
        let best = |item: usize| {
            self.viterbi_unchecked(emissions.slice(s![item, ..lengths[item], ..]))
        };
        let paths = if self.parallel {
            (0..lengths.len()).into_par_iter().map(best).collect()
        } else {
            (0..lengths.len()).map(best).collect()
        };
        Ok(paths)
    }

    fn score_unchecked(&self, emissions: ArrayView2<f32>, tags: &[usize]) -> f32 {
        let (Some(&first), Some(&last)) = (tags.first(), tags.last()) else {
            return 0.0;
        };
        let transitions = &self.transitions;
        let mut score = transitions[[self.begin(), first]] + emissions[[0, first]];
        for (i, pair) in tags.windows(2).enumerate() {
            score += transitions[[pair[0], pair[1]]] + emissions[[i + 1, pair[1]]];
        }
        score + transitions[[last, self.end()]]
    }

    fn log_partition_unchecked(&self, emissions: ArrayView2<f32>) -> f32 {
        let n = self.num_tags;
        let tag_transitions = self.transitions.slice(s![..n, ..n]);
        let mut alpha: Array1<f32> =
            &self.transitions.slice(s![self.begin(), ..n]) + &emissions.row(0);
        for emission in emissions.outer_iter().skip(1) {
            // scores[[i, j]]: best of alpha[i] followed by the transition i -> j
            let scores = &alpha.view().insert_axis(Axis(1)) + &tag_transitions;
            alpha = Zip::from(scores.columns())
                .and(&emission)
                .map_collect(|column, &e| log_sum_exp(column) + e);
        }
        let last = &alpha + &self.transitions.slice(s![..n, self.end()]);
        log_sum_exp(last.view())
    }

    fn viterbi_unchecked(&self, emissions: ArrayView2<f32>) -> Vec<usize> {
        let n = self.num_tags;
        let tag_transitions = self.transitions.slice(s![..n, ..n]);
        let mut delta: Array1<f32> =
            &self.transitions.slice(s![self.begin(), ..n]) + &emissions.row(0);
        let mut backpointers: Vec<Array1<usize>> = Vec::with_capacity(emissions.nrows());
        for emission in emissions.outer_iter().skip(1) {
            let scores = &delta.view().insert_axis(Axis(1)) + &tag_transitions;
            let best = Zip::from(scores.columns())
                .and(&emission)
                .map_collect(|column, &e| {
                    let (i, score) = argmax(column);
                    (i, score + e)
                });
            backpointers.push(best.mapv(|(i, _)| i));
            delta = best.mapv(|(_, score)| score);
        }
        let last = &delta + &self.transitions.slice(s![..n, self.end()]);
        let (mut tag, _) = argmax(last.view());
        let mut path = Vec::with_capacity(emissions.nrows());
        path.push(tag);
        for pointers in backpointers.iter().rev() {
            tag = pointers[tag];
            path.push(tag);
        }
        path.reverse();
        path
    }
}

/// First maximum of `values` and its index.
pub(crate) fn argmax(values: ArrayView1<f32>) -> (usize, f32) {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
}

pub(crate) fn log_sum_exp(values: ArrayView1<f32>) -> f32 {
    let max = values.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    if max == f32::NEG_INFINITY {
        return max;
    }
    max + values.fold(0.0, |acc, &v| acc + (v - max).exp()).ln()
}
