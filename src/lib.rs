/*!
This library is the core of a sequence labeling toolkit. It converts tag sequences into typed
spans (chunks) and back, scores and decodes tag sequences with a linear-chain CRF and computes the
chunk level metrics of the predictions. Emission scores are an input: this library does not
produce them.
# SCHEMES
The current schemes are supported:
* BIO1 (IOB1): `I` is a token inside a chunk, `O` is a token outside a chunk and `B` is the
    beginning of the chunk immediately following another chunk of the same type. Whether every
    chunk gets a `B` when written is controlled by `Bio1Begin`.
* BIO2 (IOB2): It is same as BIO1, except that a `B` tag is given to the first token of every
    chunk.
* BIOES (IOBES): `E` marks the last token of a chunk and `S` a chunk of a single token.
* BMES: It is the same as BIOES, with `M` (middle) instead of `I`.
* OntoNotes: CoNLL-2012 brackets. `(PER*` opens a chunk, `*` continues it (or is outside when no
    chunk is open), `*)` closes it and `(PER)` is a chunk of a single token.

Reading tags never fails. Ill-formed tags are repaired: an inside tag that does not continue the
open chunk starts a new chunk, and an end tag that does not close the open chunk is a single token
chunk. Tags which cannot be read at all are outside.

## More information about schemes
* [Wikipedia](https://en.wikipedia.org/wiki/Inside%E2%80%93outside%E2%80%93beginning_(tagging))
* [Article](https://cs229.stanford.edu/proj2005/KrishnanGanapathy-NamedEntityRecognition.pdf), chapter 2

# Terminology
* An entity type is what we are interested in, such as 'LOC' for location, 'PER' for person,
    'GEO' for geography, etc. It can be anything, but must be represented by a string.
* A tag is a string made of a prefix and an entity type, such as `B-PER`. The prefix indicates
    where we are in the current chunk.
* A chunk is a half-open range `start..end` of tokens associated with an entity type. Chunks are
    compared by type, start and end.
* Emissions are the `(batch, max_len, num_tags)` scores of each tag at each position. The mask
    tells which positions are real tokens: each row is a prefix of `true` values.
* Transitions are the scores of moving from one tag to the next. The CRF adds a `BEGIN` and an
    `END` tag after the real ones.
*/

mod batch;
mod chunk;
mod config;
mod crf;
mod decoder;
mod metrics;
mod reporter;
mod schemes;
mod segmentation;
mod translator;
mod vocab;

// The public api starts here
pub use schemes::{
    Position, SchemeType, UnknownSchemeError, DELIMITER, ONTONOTES_OUTSIDE_TAG, OUTSIDE_TAG,
    PAD_TAG,
};

pub use chunk::{Chunk, Chunks};

pub use translator::{Bio1Begin, ChunksTagsTranslator, TranslationError};

pub use vocab::{TagVocab, VocabError};

pub use batch::{pad_tag_ids, sequence_lengths, BatchError};

pub use crf::{Crf, CrfError, IMPOSSIBLE_SCORE};

pub use decoder::{
    ConfigError, DecoderArch, DecoderConfig, DecoderConfigBuilder, SequenceTaggingDecoder,
};

pub use metrics::{
    classification_report, precision_recall_f1_report, precision_recall_fscore_support,
    ComputationError, DivByZeroStrat, DivisionByZeroError, InconsistentLengthError,
    ParsingDivisionByZeroStrategyError, PrecisionRecallFScoreTrueSum,
};

pub use reporter::{Average, AverageParsingError, ClassMetrics, OverallAverage, Reporter};

pub use config::{EvalConfig, EvalConfigBuilder, EvalConfigError};

pub use segmentation::{
    segment_text_uniformly, segment_text_with_hierarchical_seps, segment_text_with_seps,
    SegmentationError, UniformSpans,
};

/// This function computes the precision, recall, fscore and support of the true and predicted
/// tags. The tags are read into chunks with the scheme of the config, then compared with
/// `classification_report`.
///
/// * `y_true`: True tags, one `Vec` per sequence
/// * `y_pred`: Predicted tags, one `Vec` per sequence
/// * `config`: Scheme and parameters used to compute the metrics of each entity type.
///
/// #Example
/// ```rust
/// use rutag::{SchemeType, EvalConfigBuilder, classification_report_conf};
///
/// let y_true = vec![vec!["B-TEST", "B-NOTEST", "O", "B-TEST"]];
/// let y_pred = vec![vec!["O", "B-NOTEST", "B-OTHER", "B-TEST"]];
/// let config = EvalConfigBuilder::default().scheme(SchemeType::BIO2).build().unwrap();
///
/// let reporter = classification_report_conf(&y_true, &y_pred, config).unwrap();
/// let expected_report = "Class, Precision, Recall, Fscore, Support
/// Overall_Weighted, 1, 0.6666667, 0.77777785, 3
/// Overall_Micro, 0.6666667, 0.6666667, 0.6666667, 3
/// Overall_Macro, 0.6666667, 0.5, 0.5555556, 3
/// NOTEST, 1, 1, 1, 1
/// OTHER, 0, 0, 0, 0
/// TEST, 1, 0.5, 0.6666667, 2\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
pub fn classification_report_conf<S: AsRef<str> + Sync>(
    y_true: &[Vec<S>],
    y_pred: &[Vec<S>],
    config: EvalConfig,
) -> Result<Reporter, ComputationError> {
    let translator = config.translator();
    let (zero_division, parallel) = (config.zero_division(), config.parallel());
    let chunks_true = translator.batch_tags2chunks(y_true, parallel);
    let chunks_pred = translator.batch_tags2chunks(y_pred, parallel);
    classification_report(&chunks_true, &chunks_pred, zero_division, parallel)
}
