/**
This modules gives a few tools to prettyprint the metrics of every entity type and the overall
metrics.
*/
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// The reporter holds the metrics of every entity type and the overall metrics. It can be used to
/// display the results (i.e. prettyprint them) as if they were collected into a dataframe and can
/// be consumed to obtain a `HashSet` containing the metrics. The reporter can be built with the
/// `classification_report` function.
///
/// # Example
///
/// ```rust
/// use rutag::{classification_report, Chunk, DivByZeroStrat};
///
/// let y_true = vec![vec![Chunk::new("TEST", 0, 1), Chunk::new("NOTEST", 1, 2), Chunk::new("TEST", 3, 4)]];
/// let y_pred = vec![vec![Chunk::new("NOTEST", 1, 2), Chunk::new("OTHER", 2, 3), Chunk::new("TEST", 3, 4)]];
///
/// let reporter = classification_report(&y_true, &y_pred, DivByZeroStrat::ReplaceBy0, false).unwrap();
///
/// let expected_report =
/// "Class, Precision, Recall, Fscore, Support
/// Overall_Weighted, 1, 0.6666667, 0.77777785, 3
/// Overall_Micro, 0.6666667, 0.6666667, 0.6666667, 3
/// Overall_Macro, 0.6666667, 0.5, 0.5555556, 3
/// NOTEST, 1, 1, 1, 1
/// OTHER, 0, 0, 0, 0
/// TEST, 1, 0.5, 0.6666667, 2\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Reporter {
    pub(crate) classes: BTreeSet<ClassMetricsInner>,
}

/// By converting the reporter into a `HashSet` of `ClassMetrics`, you lose the ordering of the
/// reporter. If you mean to consume the data without prettypriting it, this is not a problem.
impl From<Reporter> for HashSet<ClassMetrics> {
    fn from(value: Reporter) -> Self {
        value.classes.into_iter().map(ClassMetrics::from).collect()
    }
}

impl Reporter {
    pub(crate) fn insert(&mut self, metrics: ClassMetricsInner) -> bool {
        self.classes.insert(metrics)
    }

    /// Metrics of a single entity type, if it appeared in the gold or in the predicted chunks.
    pub fn get(&self, class: &str) -> Option<ClassMetrics> {
        self.classes
            .iter()
            .find(|c| c.average == Average::None && c.class == class)
            .cloned()
            .map(ClassMetrics::from)
    }

    pub fn overall(&self, average: OverallAverage) -> Option<ClassMetrics> {
        let average = Average::from(average);
        self.classes
            .iter()
            .find(|c| c.average == average)
            .cloned()
            .map(ClassMetrics::from)
    }

    /// Per entity type metrics, sorted by entity type.
    pub fn classes(&self) -> impl Iterator<Item = ClassMetrics> + '_ {
        self.classes
            .iter()
            .filter(|c| c.average == Average::None)
            .cloned()
            .map(ClassMetrics::from)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Logs the overall metrics at the `INFO` level.
    pub fn log_summary(&self) {
        let fscore = |avg| self.overall(avg).map(|m| m.fscore).unwrap_or(0.0);
        info!(
            micro_f1 = fscore(OverallAverage::Micro),
            macro_f1 = fscore(OverallAverage::Macro),
            weighted_f1 = fscore(OverallAverage::Weighted),
            classes = self.classes().count(),
            "chunk metrics"
        );
    }
}

/// The Reporter struct acts as a dataframe when displayed. Overall metrics come first, then every
/// entity type in ascending order.
impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        for v in self.classes.iter() {
            writeln!(f, "{}", v)?
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Datastructure holding metrics about a given class.
pub struct ClassMetrics {
    /// The class, such as "PER", "GEO", "MISC", etc.
    pub class: String,
    /// The average used to compute this class' metrics
    pub average: Average,
    /// Precision metric
    pub precision: f32,
    /// Recall metric
    pub recall: f32,
    /// Fscore metric
    pub fscore: f32,
    /// Support metric
    pub support: usize,
}

impl Hash for ClassMetrics {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.average.hash(state)
    }
}

impl PartialEq for ClassMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetrics {}

impl From<ClassMetricsInner> for ClassMetrics {
    fn from(value: ClassMetricsInner) -> Self {
        Self {
            class: value.class,
            average: value.average,
            precision: value.precision,
            recall: value.recall,
            fscore: value.fscore,
            support: value.support,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// Line of the report. Two lines are equal when they share the class and the average, whatever
/// their metrics.
pub(crate) struct ClassMetricsInner {
    pub(crate) class: String,
    pub(crate) average: Average,
    pub(crate) precision: f32,
    pub(crate) recall: f32,
    pub(crate) fscore: f32,
    pub(crate) support: usize,
}
impl PartialEq for ClassMetricsInner {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.average == other.average
    }
}
impl Eq for ClassMetricsInner {}

impl PartialOrd for ClassMetricsInner {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassMetricsInner {
    fn cmp(&self, other: &Self) -> Ordering {
        self.average
            .report_rank()
            .cmp(&other.average.report_rank())
            .then_with(|| self.class.cmp(&other.class))
    }
}

impl ClassMetricsInner {
    pub(crate) fn new_overall(
        average: OverallAverage,
        precision: f32,
        recall: f32,
        fscore: f32,
        support: usize,
    ) -> Self {
        let class = average.to_string();
        ClassMetricsInner {
            class,
            average: average.into(),
            precision,
            recall,
            fscore,
            support,
        }
    }
}

/// The ClassMetricsInner struct acts as a line in a dataframe when displayed.
impl Display for ClassMetricsInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.class, self.precision, self.recall, self.fscore, self.support
        )
    }
}

/// Enumeration of the different types of averaging possible and supported by this crate. &str can
/// be parsed to create an `Average`.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Average {
    None,
    Micro,
    Macro,
    Weighted,
}

impl Average {
    /// Position of the lines using this average in a report.
    fn report_rank(&self) -> u8 {
        match self {
            Self::Weighted => 0,
            Self::Micro => 1,
            Self::Macro => 2,
            Self::None => 3,
        }
    }
}

impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Average::None),
            "micro" => Ok(Average::Micro),
            "macro" => Ok(Average::Macro),
            "weighted" => Ok(Average::Weighted),
            _ => Err(AverageParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Error)]
#[error("Impossible to parse the string ({0}) into an Average")]
pub struct AverageParsingError(String);

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum OverallAverage {
    Micro,
    Macro,
    Weighted,
}

impl Display for OverallAverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str_content = match self {
            Self::Micro => "Overall_Micro",
            Self::Macro => "Overall_Macro",
            Self::Weighted => "Overall_Weighted",
        };
        write!(f, "{}", str_content)
    }
}

impl From<OverallAverage> for Average {
    fn from(value: OverallAverage) -> Self {
        match value {
            OverallAverage::Micro => Average::Micro,
            OverallAverage::Macro => Average::Macro,
            OverallAverage::Weighted => Average::Weighted,
        }
    }
}
