/**
This module computes the chunk level metrics (precision, recall, f-score, support) of the gold
chunks and the predicted chunks. A predicted chunk is a true positive if a gold chunk of the same
sequence has the same type, start and end.
*/
use crate::chunk::{Chunk, Chunks};
use crate::reporter::{Average, ClassMetricsInner, OverallAverage, Reporter};
use itertools::multizip;
use ndarray::{prelude::*, Data, ScalarOperand, Zip};
use ndarray_stats::{errors::MultiInputError, SummaryStatisticsExt};
use num::{Float, Num, NumCast};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Debug, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("This array contains more than one element or is empty. It has length: {0}. Cannot call `item` on it")]
pub struct ArrayNotUniqueOrEmpty(usize);

trait ItemArrayExt<Output> {
    /// Returns the element out of the Array. Can return an error if the array is empty of if the
    /// array has a length superior to 1.
    fn item(&self) -> Result<Output, ArrayNotUniqueOrEmpty>;
}

impl<F: Clone, T: Data<Elem = F>> ItemArrayExt<F> for ArrayBase<T, Dim<[usize; 1]>> {
    fn item(&self) -> Result<F, ArrayNotUniqueOrEmpty> {
        match (self.len(), self.first()) {
            (1, Some(first)) => Ok(first.clone()),
            (n, _) => Err(ArrayNotUniqueOrEmpty(n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// How do we handle cases with a division by zero? Do we replace the denominator by 1, return an
/// error, or replace the division result with 0? Reports use the `ReplaceBy0` strategy by default.
/// The `ReturnError` strategy stops the computation at the first label without any predicted or
/// gold chunk.
pub enum DivByZeroStrat {
    /// Replace denominator equal to `0` by `1` for the calculations
    ReplaceBy1,
    /// Returns an error
    ReturnError,
    /// Returns 0 when the denominator is 0
    #[default]
    ReplaceBy0,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse `{0}` into a `DivByZeroStrat`")]
pub struct ParsingDivisionByZeroStrategyError(String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby1" | "replacebyone" => Ok(DivByZeroStrat::ReplaceBy1),
            "replaceby0" | "replacebyzero" => Ok(DivByZeroStrat::ReplaceBy0),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Encountered division by zero")]
pub struct DivisionByZeroError;

/// Internal extension trait for Num's Float trait
pub trait FloatExt: Float + Send + Sync + Clone + ScalarOperand + Debug {}

impl<T: Float + Send + Sync + Clone + Copy + ScalarOperand + Debug> FloatExt for T {}

fn prf_divide<I: Debug + Num + Clone + Send + Sync + Copy, D: Dimension>(
    numerator: ArcArray<I, D>,
    denominator: ArrayViewMut<I, D>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> Result<ArcArray<I, D>, DivisionByZeroError> {
    let (mut result, zero_mask) = if parallel {
        par_prf_divide_results_and_mask(numerator, denominator)
    } else {
        prf_divide_results_and_mask(numerator, denominator)
    };

    match zero_division {
        DivByZeroStrat::ReturnError => {
            if zero_mask.iter().any(|m| *m == I::zero()) {
                Err(DivisionByZeroError)
            } else {
                Ok(result)
            }
        }
        DivByZeroStrat::ReplaceBy1 => Ok(result),
        DivByZeroStrat::ReplaceBy0 => {
            if parallel {
                Zip::from(&mut result)
                    .and(&zero_mask)
                    .par_for_each(|r, m| *r = *r * *m);
            } else {
                result = result * zero_mask;
            }
            Ok(result)
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
/// Error type to represent when two lists or arrays are not of the same length (when they should
/// be).
#[error("Inconsistent length between two lists. `y_true` is length {0}, `y_pred` is length {1}")]
pub struct InconsistentLengthError(usize, usize);

fn check_for_empty_slices<T>(y_true: &[T], y_pred: &[T]) -> Result<(), ComputationError> {
    if y_true.is_empty() {
        return Err(ComputationError::EmptyInput(String::from("y_true")));
    };
    if y_pred.is_empty() {
        return Err(ComputationError::EmptyInput(String::from("y_pred")));
    };
    Ok(())
}

/// Gold and predicted chunks must describe the same sequences.
fn check_consistent_length<T>(y_true: &[T], y_pred: &[T]) -> Result<(), InconsistentLengthError> {
    if y_true.len() != y_pred.len() {
        return Err(InconsistentLengthError(y_true.len(), y_pred.len()));
    }
    Ok(())
}

/// predicted sum, true positive sum and true sum
type ActualTPCorrect<T> = (Array1<T>, Array1<T>, Array1<T>);

/// Counts the predicted chunks, the true positives and the gold chunks of every entity type found
/// in either `y_true` or `y_pred`. Types are sorted.
#[inline(always)]
fn extract_tp_actual_correct<'a>(
    y_true: &'a Chunks,
    y_pred: &'a Chunks,
) -> (Vec<&'a str>, ActualTPCorrect<usize>) {
    let target_names: BTreeSet<&str> = y_true
        .unique_tags()
        .union(&y_pred.unique_tags())
        .copied()
        .collect();
    let target_names: Vec<&str> = target_names.into_iter().collect();

    let pred_sum: Array1<usize> =
        Array::from_iter(target_names.iter().map(|t| y_pred.filter_count(t)));
    let tp_sum: Array1<usize> = Array::from_iter(
        target_names
            .iter()
            .map(|t| y_true.filter(t).intersection(&y_pred.filter(t)).count()),
    );
    let true_sum: Array1<usize> =
        Array::from_iter(target_names.iter().map(|t| y_true.filter_count(t)));

    (target_names, (pred_sum, tp_sum, true_sum))
}

#[derive(Debug, Clone, PartialEq, Error)]
/// Enum error encompassing many type of failures that could happen when computing the precison,
/// recall, f-score and the support.
pub enum ComputationError {
    #[error("Beta value is not positive")]
    BetaNotPositive,
    #[error("Beta value cannot be represented as a f32")]
    BetaOutOfRange,
    #[error(transparent)]
    InconsistentLength(#[from] InconsistentLengthError),
    #[error(transparent)]
    DivisionByZero(#[from] DivisionByZeroError),
    #[error(transparent)]
    InputError(#[from] MultiInputError),
    #[error("Found an empty array in {0}")]
    EmptyArray(String),
    #[error(transparent)]
    EmptyOrNotUnique(#[from] ArrayNotUniqueOrEmpty),
    #[error("Received an empty input {0}")]
    EmptyInput(String),
}

/// Type alias for representing the output of the `precision_recall_fscore_support`. Each arrays
/// contain a vector of f32. The first array contains the precision, the second the recall, the
/// third the f-score and the last one the support.
pub type PrecisionRecallFScoreTrueSum = (
    Array<f32, Dim<[usize; 1]>>,
    Array<f32, Dim<[usize; 1]>>,
    Array<f32, Dim<[usize; 1]>>,
    Array<usize, Dim<[usize; 1]>>,
);

/// Computes the precision, recall, fscore and support of the predicted chunks. With
/// `Average::None`, the arrays hold one value per entity type, sorted by type. Otherwise they hold
/// a single value.
///
/// * `y_true`: Gold chunks, one `Vec` per sequence
/// * `y_pred`: Predicted chunks, one `Vec` per sequence
/// * `beta`: Value of the `beta` parameter of the fscore. `beta=1` for F1 and `beta=0.5` for F0.5.
/// * `average`: What type of average to use.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for computations?
pub fn precision_recall_fscore_support<F: FloatExt>(
    y_true: &[Vec<Chunk>],
    y_pred: &[Vec<Chunk>],
    beta: F,
    average: Average,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<PrecisionRecallFScoreTrueSum, ComputationError> {
    check_for_empty_slices(y_true, y_pred)?;
    check_consistent_length(y_true, y_pred)?;
    let (chunks_true, chunks_pred) = (Chunks::from(y_true), Chunks::from(y_pred));
    let (_, counts) = extract_tp_actual_correct(&chunks_true, &chunks_pred);
    precision_recall_fscore_support_inner(counts, beta, average, zero_division, parallel)
}

fn precision_recall_fscore_support_inner<F: FloatExt>(
    counts: ActualTPCorrect<usize>,
    beta: F,
    average: Average,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<PrecisionRecallFScoreTrueSum, ComputationError> {
    if beta.is_sign_negative() {
        return Err(ComputationError::BetaNotPositive);
    };
    let beta: f32 = <f32 as NumCast>::from(beta).ok_or(ComputationError::BetaOutOfRange)?;
    let (mut pred_sum, mut tp_sum, mut true_sum) = counts;
    let beta2 = beta.powi(2);
    if matches!(average, Average::Micro) {
        tp_sum = array![tp_sum.sum()];
        pred_sum = array![pred_sum.sum()];
        true_sum = array![true_sum.sum()];
    };
    let arc_tp_sum = tp_sum.mapv(|x| x as f32).to_shared();
    let precision = prf_divide(
        arc_tp_sum.clone(), // ArcArray are (often) inexpensive to clone.
        pred_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let recall = prf_divide(
        arc_tp_sum,
        true_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let f_score: ArcArray<f32, Dim<[usize; 1]>> = if beta2.is_infinite() {
        recall.clone()
    } else {
        let denom = precision.clone() * beta2 + recall.view();
        let denom_non_zero = if parallel {
            par_replace(denom, 0.0, 1.0)
        } else {
            replace(denom, 0.0, 1.0)
        };
        (beta2 + 1.0) * precision.clone() * recall.view() / denom_non_zero
    };
    match average {
        Average::Weighted => {
            let weights = true_sum;
            if weights.sum() == 0 {
                return match zero_division {
                    DivByZeroStrat::ReturnError => {
                        Err(ComputationError::DivisionByZero(DivisionByZeroError))
                    }
                    _ => Ok((array![0.], array![0.], array![0.], array![0])),
                };
            };
            let shared_weights = weights.mapv(|x| x as f32).into_shared();
            let final_precision = array![precision.weighted_mean(&shared_weights)?];
            let final_recall = array![recall.weighted_mean(&shared_weights)?];
            let final_f_score = array![f_score.weighted_mean(&shared_weights)?];
            Ok((
                final_precision,
                final_recall,
                final_f_score,
                array![weights.sum()],
            ))
        }
        Average::None => Ok((
            precision.into_owned(),
            recall.into_owned(),
            f_score.into_owned(),
            true_sum,
        )),
        Average::Micro | Average::Macro => {
            let final_precision = array![precision
                .mean()
                .ok_or_else(|| ComputationError::EmptyArray(String::from("precision")))?];
            let final_recall = array![recall
                .mean()
                .ok_or_else(|| ComputationError::EmptyArray(String::from("recall")))?];
            let final_f_score = array![f_score
                .mean()
                .ok_or_else(|| ComputationError::EmptyArray(String::from("fscore")))?];
            Ok((
                final_precision,
                final_recall,
                final_f_score,
                array![true_sum.sum()],
            ))
        }
    }
}

/// This function computes the result in parallel. For a synchronous
/// version of this function, see `prf_divide_results_and_mask`.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn par_prf_divide_results_and_mask<I: Debug + Num + Clone + Send + Sync, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask = Zip::from(&mut denominator).par_map_collect(|d| {
        if *d == I::zero() {
            I::zero()
        } else {
            I::one()
        }
    });
    denominator.par_mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// This function computes the result synchronously. For a parallel
/// version of this function, see `par_prf_divide_results_and_mask`.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn prf_divide_results_and_mask<I: Debug + Num + Clone, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask =
        Zip::from(&mut denominator)
            .map_collect(|d| if *d == I::zero() { I::zero() } else { I::one() });
    denominator.mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// Helper function to replace values from an array.
fn replace<Data: PartialEq + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Helper function to replace values from an array in parallel.
fn par_replace<Data: PartialEq + Send + Sync + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.par_mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Main entrypoint of the metric reporter. This function computes the precision, recall, fscore
/// and support of the predicted chunks. It returns the metrics of each entity type and the micro,
/// macro and weighted averages. The returned structure can be used to prettyprint the results or
/// be converted into a HashSet.
///
/// * `y_true`: Gold chunks, one `Vec` per sequence
/// * `y_pred`: Predicted chunks, one `Vec` per sequence
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for matrix computations?
pub fn classification_report(
    y_true: &[Vec<Chunk>],
    y_pred: &[Vec<Chunk>],
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<Reporter, ComputationError> {
    check_for_empty_slices(y_true, y_pred)?;
    check_consistent_length(y_true, y_pred)?;
    let (chunks_true, chunks_pred) = (Chunks::from(y_true), Chunks::from(y_pred));
    let (target_names, counts) = extract_tp_actual_correct(&chunks_true, &chunks_pred);
    let (p, r, f1, s) = precision_recall_fscore_support_inner::<f32>(
        counts.clone(),
        1.0,
        Average::None,
        zero_division,
        parallel,
    )?;
    let mut reporter = Reporter::default();
    for (name, precision, recall, fscore, support) in multizip((
        target_names.iter(),
        p.into_iter(),
        r.into_iter(),
        f1.into_iter(),
        s.into_iter(),
    )) {
        reporter.insert(ClassMetricsInner {
            class: String::from(*name),
            precision,
            recall,
            fscore,
            support,
            average: Average::None,
        });
    }
    for avg in [
        OverallAverage::Micro,
        OverallAverage::Macro,
        OverallAverage::Weighted,
    ] {
        let (p, r, f1, s) = precision_recall_fscore_support_inner::<f32>(
            counts.clone(),
            1.0,
            avg.into(),
            zero_division,
            parallel,
        )?;
        reporter.insert(ClassMetricsInner::new_overall(
            avg,
            p.item()?,
            r.item()?,
            f1.item()?,
            s.item()?,
        ));
    }
    Ok(reporter)
}

/// Per entity type precision, recall, f1 and support of the predicted chunks, with the micro,
/// macro and weighted averages. Divisions by zero give 0.
pub fn precision_recall_f1_report(
    y_true: &[Vec<Chunk>],
    y_pred: &[Vec<Chunk>],
) -> Result<Reporter, ComputationError> {
    classification_report(y_true, y_pred, DivByZeroStrat::ReplaceBy0, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::ClassMetrics;
    use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};
    use rstest::rstest;

    pub trait CloseEnough {
        fn are_close(&self, other: &Self, eps: f32) -> bool;
    }

    // ClassMetricsInner only compares the class and the average.
    impl CloseEnough for ClassMetricsInner {
        fn are_close(&self, other: &Self, eps: f32) -> bool {
            self == other
                && f32::abs(self.precision - other.precision) < eps
                && f32::abs(self.recall - other.recall) < eps
                && f32::abs(self.fscore - other.fscore) < eps
                && self.support == other.support
        }
    }
    impl CloseEnough for Reporter {
        fn are_close(&self, other: &Self, eps: f32) -> bool {
            self.classes.len() == other.classes.len()
                && self
                    .classes
                    .iter()
                    .zip(other.classes.iter())
                    .all(|(c1, c2)| c1.are_close(c2, eps))
        }
    }

    fn chunks(sequences: Vec<Vec<(&str, usize, usize)>>) -> Vec<Vec<Chunk>> {
        sequences
            .into_iter()
            .map(|s| s.into_iter().map(Chunk::from).collect())
            .collect()
    }

    /// Gold and predicted chunks of the `B-MISC`/`B-PER` sequences: the MISC chunk is predicted one
    /// token too early, the PER chunk is found.
    fn misc_and_per() -> (Vec<Vec<Chunk>>, Vec<Vec<Chunk>>) {
        (
            chunks(vec![vec![("MISC", 3, 6)], vec![("PER", 0, 2)]]),
            chunks(vec![vec![("MISC", 2, 6)], vec![("PER", 0, 2)]]),
        )
    }

    #[test]
    fn test_reporter_output() {
        let y_true = chunks(vec![vec![("A", 0, 1), ("B", 1, 2), ("A", 3, 4)]]);
        let y_pred = chunks(vec![vec![("B", 1, 2), ("C", 2, 3), ("A", 3, 4)]]);
        let actual = classification_report(&y_true, &y_pred, DivByZeroStrat::ReplaceBy0, false)
            .unwrap();
        let expected = Reporter {
            classes: BTreeSet::from_iter(vec![
                ClassMetricsInner {
                    class: String::from("A"),
                    fscore: 0.6666666666666666,
                    precision: 1.0,
                    recall: 0.5,
                    support: 2,
                    average: Average::None,
                },
                ClassMetricsInner {
                    class: String::from("B"),
                    fscore: 1.0,
                    precision: 1.0,
                    recall: 1.0,
                    support: 1,
                    average: Average::None,
                },
                ClassMetricsInner {
                    class: String::from("C"),
                    fscore: 0.0,
                    precision: 0.0,
                    recall: 0.0,
                    support: 0,
                    average: Average::None,
                },
                ClassMetricsInner::new_overall(
                    OverallAverage::Macro,
                    0.66666666666666,
                    0.5,
                    0.55555555555555,
                    3,
                ),
                ClassMetricsInner::new_overall(
                    OverallAverage::Micro,
                    0.66666666666666,
                    0.66666666666666,
                    0.66666666666666,
                    3,
                ),
                ClassMetricsInner::new_overall(
                    OverallAverage::Weighted,
                    1.0,
                    0.66666666666666,
                    0.77777777777777,
                    3,
                ),
            ]),
        };
        assert!(actual.are_close(&expected, 1e-6));
    }

    #[test]
    fn test_perfect_prediction() {
        let y_true = chunks(vec![vec![("PER", 0, 2)]]);
        let reporter = precision_recall_f1_report(&y_true, &y_true).unwrap();
        let per = reporter.get("PER").unwrap();
        assert_eq!((per.precision, per.recall, per.fscore, per.support), (1.0, 1.0, 1.0, 1));
        for avg in [OverallAverage::Micro, OverallAverage::Macro] {
            let overall = reporter.overall(avg).unwrap();
            assert_eq!(
                (overall.precision, overall.recall, overall.fscore),
                (1.0, 1.0, 1.0)
            );
        }
    }

    #[test]
    fn test_chunks_only_match_within_their_sequence() {
        let y_true = chunks(vec![vec![("PER", 0, 2)], vec![]]);
        let y_pred = chunks(vec![vec![], vec![("PER", 0, 2)]]);
        let (p, r, f, s) = precision_recall_fscore_support(
            &y_true,
            &y_pred,
            1.0,
            Average::Micro,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        assert_eq!((p[0], r[0], f[0], s[0]), (0.0, 0.0, 0.0, 1));
    }

    #[test]
    fn test_classification_report_display() {
        let (y_true, y_pred) = misc_and_per();
        let reporter =
            classification_report(&y_true, &y_pred, DivByZeroStrat::ReplaceBy0, true).unwrap();
        // NOTE: Do not change the indentation
        let expected = "Class, Precision, Recall, Fscore, Support
Overall_Weighted, 0.5, 0.5, 0.5, 2
Overall_Micro, 0.5, 0.5, 0.5, 2
Overall_Macro, 0.5, 0.5, 0.5, 2
MISC, 0, 0, 0, 1
PER, 1, 1, 1, 1\n";
        assert_eq!(reporter.to_string(), expected);
    }

    #[test]
    fn test_classification_report_inconsistent_length() {
        let y_true = chunks(vec![vec![("PER", 0, 1)], vec![]]);
        let y_pred = chunks(vec![vec![]]);
        assert_eq!(
            classification_report(&y_true, &y_pred, DivByZeroStrat::ReplaceBy1, true),
            Err(ComputationError::InconsistentLength(InconsistentLengthError(2, 1)))
        );
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Vec<Chunk>> = vec![];
        let res = precision_recall_fscore_support(
            &empty,
            &empty,
            1.0,
            Average::Macro,
            DivByZeroStrat::ReplaceBy0,
            false,
        );
        assert_eq!(res, Err(ComputationError::EmptyInput(String::from("y_true"))));
    }

    #[test]
    fn test_macro_without_labels_is_an_error() {
        let y = chunks(vec![vec![]]);
        let res = precision_recall_fscore_support(
            &y,
            &y,
            1.0,
            Average::Macro,
            DivByZeroStrat::ReplaceBy0,
            false,
        );
        assert_eq!(res, Err(ComputationError::EmptyArray(String::from("precision"))));
        let (p, _, _, s) = precision_recall_fscore_support(
            &y,
            &y,
            1.0,
            Average::Micro,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        assert_eq!((p[0], s[0]), (0.0, 0));
    }

    #[rstest]
    #[case(Average::Micro, (0.5, 0.5, 0.5, 2))]
    #[case(Average::Macro, (0.5, 0.5, 0.5, 2))]
    #[case(Average::Weighted, (0.5, 0.5, 0.5, 2))]
    fn test_precision_recall_fscore_support(
        #[case] average: Average,
        #[case] expected: (f32, f32, f32, usize),
    ) {
        let (y_true, y_pred) = misc_and_per();
        for parallel in [true, false] {
            let (p, r, f, s) = precision_recall_fscore_support(
                &y_true,
                &y_pred,
                1.0,
                average,
                DivByZeroStrat::ReplaceBy0,
                parallel,
            )
            .unwrap();
            assert_eq!(
                (p.item().unwrap(), r.item().unwrap(), f.item().unwrap(), s.item().unwrap()),
                expected
            );
        }
    }

    #[test]
    fn test_precision_recall_fscore_support_no_average() {
        let (y_true, y_pred) = misc_and_per();
        let actual = precision_recall_fscore_support(
            &y_true,
            &y_pred,
            1.0,
            Average::None,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        let expected = (
            array![0. as f32, 1. as f32],
            array![0. as f32, 1. as f32],
            array![0. as f32, 1. as f32],
            array![1, 1],
        );
        assert_eq!(actual, expected)
    }

    #[test]
    fn test_fbeta_weights_recall() {
        // precision 1, recall 0.5
        let y_true = chunks(vec![vec![("PER", 0, 1), ("PER", 2, 3)]]);
        let y_pred = chunks(vec![vec![("PER", 0, 1)]]);
        let (_, _, f2, _) = precision_recall_fscore_support(
            &y_true,
            &y_pred,
            2.0,
            Average::Micro,
            DivByZeroStrat::ReplaceBy0,
            false,
        )
        .unwrap();
        // (1 + 4) * 0.5 / (4 + 0.5)
        assert!((f2[0] - 5.0 * 0.5 / 4.5).abs() < 1e-6);
    }

    #[rstest]
    #[case(DivByZeroStrat::ReplaceBy0, Ok(0.0))]
    #[case(DivByZeroStrat::ReplaceBy1, Ok(0.0))]
    #[case(DivByZeroStrat::ReturnError, Err(ComputationError::DivisionByZero(DivisionByZeroError)))]
    fn test_zero_division_strategies(
        #[case] strategy: DivByZeroStrat,
        #[case] expected: Result<f32, ComputationError>,
    ) {
        // No predicted PER chunk: the precision divides by zero.
        let y_true = chunks(vec![vec![("PER", 0, 1)]]);
        let y_pred = chunks(vec![vec![]]);
        let actual = precision_recall_fscore_support(
            &y_true,
            &y_pred,
            1.0,
            Average::None,
            strategy,
            false,
        )
        .map(|(p, _, _, _)| p[0]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_div_by_zero_strat_from_str() {
        assert_eq!(
            DivByZeroStrat::from_str("ReplaceBy0"),
            Ok(DivByZeroStrat::ReplaceBy0)
        );
        assert_eq!(
            DivByZeroStrat::from_str("error"),
            Ok(DivByZeroStrat::ReturnError)
        );
        assert!(DivByZeroStrat::from_str("ignore").is_err());
    }

    #[test]
    fn test_par_divide_results_and_mask() {
        let numerator = array![[1., 2., 4., 5.]].into_shared();
        let mut cloned = numerator.clone();
        let mut same_cloned = numerator.clone();
        let denominator = cloned.view_mut();
        let same_denominator = same_cloned.view_mut();
        let (div_result, zero_mask) =
            prf_divide_results_and_mask(numerator.clone(), same_denominator);
        let (par_div_result, par_zero_mask) =
            par_prf_divide_results_and_mask(numerator, denominator);
        assert_eq!(zero_mask, Array::ones(div_result.raw_dim()));
        assert_eq!(par_zero_mask, Array::ones(par_div_result.raw_dim()));
        assert_eq!(div_result, array![[1., 1., 1., 1.,]]);
        assert_eq!(par_div_result, array![[1., 1., 1., 1.,]]);
    }

    #[test]
    fn test_replace_0s_by_1s() {
        let to_be_replaced =
            array![[[1.0, 0.0, 0.0, -1.0, 100.0], [10., 0.0, 0.0, 5.0, 10.]]].to_shared();
        let synchronous_actual = replace(to_be_replaced.clone(), 0.0, 1.0);
        let parallel_actual = par_replace(to_be_replaced, 0.0, 1.0);
        let expected = array![[[1.0, 1.0, 1.0, -1.0, 100.0], [10., 1.0, 1.0, 5.0, 10.]]];
        assert_eq!(synchronous_actual, expected);
        assert_eq!(parallel_actual, expected);
    }

    #[test]
    fn test_check_consistent_length() {
        assert!(check_consistent_length(&[1, 2], &[3, 4]).is_ok());
        assert_eq!(
            check_consistent_length(&[1, 2], &[3]),
            Err(InconsistentLengthError(2, 1))
        );
    }

    #[test]
    fn test_extract_tp_actual_correct() {
        let (y_true, y_pred) = misc_and_per();
        let (chunks_true, chunks_pred) = (Chunks::from(y_true), Chunks::from(y_pred));
        let (names, (predicted_sum, true_positive_sum, true_sum)) =
            extract_tp_actual_correct(&chunks_true, &chunks_pred);
        assert_eq!(names, vec!["MISC", "PER"]);
        assert_eq!(
            (vec![1, 1], vec![0, 1], vec![1, 1]),
            (
                predicted_sum.to_vec(),
                true_positive_sum.to_vec(),
                true_sum.to_vec(),
            )
        );
    }

    impl Arbitrary for OverallAverage {
        fn arbitrary(g: &mut Gen) -> Self {
            let values: [OverallAverage; 3] = [
                OverallAverage::Micro,
                OverallAverage::Macro,
                OverallAverage::Weighted,
            ];
            *g.choose(&values).unwrap()
        }
    }

    /// Chunks of a few sequences, with types and offsets drawn from a small range so that gold and
    /// predicted chunks often match.
    #[derive(Debug, Clone)]
    struct ChunkBatch(Vec<Vec<Chunk>>);

    impl Arbitrary for ChunkBatch {
        fn arbitrary(g: &mut Gen) -> Self {
            let types = ["PER", "LOC", "ORG"];
            let batch = (0..3)
                .map(|_| {
                    let n = usize::arbitrary(g) % 4;
                    (0..n)
                        .map(|_| {
                            let start = usize::arbitrary(g) % 5;
                            let len = 1 + usize::arbitrary(g) % 2;
                            Chunk::new(*g.choose(&types).unwrap(), start, start + len)
                        })
                        .collect()
                })
                .collect();
            ChunkBatch(batch)
        }
    }

    #[test]
    fn test_err_on_negative_beta() {
        fn err_on_beta(
            y_true: ChunkBatch,
            y_pred: ChunkBatch,
            beta: u8,
            average: OverallAverage,
            parallel: bool,
        ) -> TestResult {
            let beta_neg = -(1.0 + beta as f32);
            let res = precision_recall_fscore_support(
                &y_true.0,
                &y_pred.0,
                beta_neg,
                average.into(),
                DivByZeroStrat::ReplaceBy0,
                parallel,
            );
            TestResult::from_bool(res == Err(ComputationError::BetaNotPositive))
        }
        let mut qc = QuickCheck::new().tests(500);
        qc.quickcheck(
            err_on_beta as fn(ChunkBatch, ChunkBatch, u8, OverallAverage, bool) -> TestResult,
        )
    }

    #[test]
    fn test_property_metrics_are_bounded() {
        fn bounded(y_true: ChunkBatch, y_pred: ChunkBatch, average: OverallAverage) -> TestResult {
            let res = precision_recall_fscore_support(
                &y_true.0,
                &y_pred.0,
                1.0,
                average.into(),
                DivByZeroStrat::ReplaceBy0,
                false,
            );
            let (p, r, f, s) = match res {
                Ok(v) => v,
                Err(ComputationError::EmptyArray(_)) => return TestResult::discard(),
                Err(_) => return TestResult::failed(),
            };
            let in_unit = |v: f32| (0.0..=1.0 + 1e-6).contains(&v);
            TestResult::from_bool(
                p.len() == 1
                    && s.len() == 1
                    && in_unit(p[0])
                    && in_unit(r[0])
                    && in_unit(f[0])
                    && f[0] <= p[0].max(r[0]) + 1e-6,
            )
        }
        let mut qc = QuickCheck::new().tests(500);
        qc.quickcheck(bounded as fn(ChunkBatch, ChunkBatch, OverallAverage) -> TestResult)
    }

    #[test]
    fn test_reporter_converts_into_hash_set() {
        let (y_true, y_pred) = misc_and_per();
        let reporter = precision_recall_f1_report(&y_true, &y_pred).unwrap();
        let set: std::collections::HashSet<ClassMetrics> = reporter.into();
        assert_eq!(set.len(), 5);
    }
}
