/*
 * This modules contains the `EvalConfig` struct, which implements the default trait. This config
 * can be passed to the `classification_report_conf` function to simplify its arguments.
*/
use crate::metrics::{DivByZeroStrat, ParsingDivisionByZeroStrategyError};
use crate::schemes::{SchemeType, UnknownSchemeError};
use crate::translator::{Bio1Begin, ChunksTagsTranslator};
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalConfigError {
    #[error(transparent)]
    ZeroDivision(#[from] ParsingDivisionByZeroStrategyError),
    #[error(transparent)]
    Scheme(#[from] UnknownSchemeError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
/// Config struct used to simplify the inputs of `classification_report_conf`. It implements the
/// default trait.
pub struct EvalConfig {
    /// This parameter describe what to do when we encounter a division by zero when computing
    /// precision and recall. The most common solution is to replace the results by 0.
    zero_division: DivByZeroStrat,
    /// Scheme of the gold and predicted tags.
    scheme: SchemeType,
    /// Only used with the BIO1 scheme.
    bio1_begin: Bio1Begin,
    /// Can we use multiple cores to read the chunks and compute the metrics?
    parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            zero_division: DivByZeroStrat::ReplaceBy0,
            scheme: SchemeType::BIOES,
            bio1_begin: Bio1Begin::Always,
            parallel: false,
        }
    }
}

impl EvalConfig {
    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }
    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }
    pub fn bio1_begin(&self) -> Bio1Begin {
        self.bio1_begin
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
    /// Translator reading the tags of both the gold and the predicted sequences.
    pub fn translator(&self) -> ChunksTagsTranslator {
        ChunksTagsTranslator::new(self.scheme).with_bio1_begin(self.bio1_begin)
    }
}

impl From<(DivByZeroStrat, SchemeType, Bio1Begin, bool)> for EvalConfig {
    fn from(value: (DivByZeroStrat, SchemeType, Bio1Begin, bool)) -> Self {
        Self {
            zero_division: value.0,
            scheme: value.1,
            bio1_begin: value.2,
            parallel: value.3,
        }
    }
}

impl From<EvalConfig> for (DivByZeroStrat, SchemeType, Bio1Begin, bool) {
    fn from(value: EvalConfig) -> Self {
        (
            value.zero_division,
            value.scheme,
            value.bio1_begin,
            value.parallel,
        )
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Strategy when encountering a division by zero: {:?}\n Scheme used: {}\n BIO1 begin policy: {:?}\n Using parallel computations: {}",
            self.zero_division, self.scheme, self.bio1_begin, self.parallel
        )
    }
}

/// This builder can be used to build and customize an `EvalConfig` structure. The division by zero
/// strategy and the scheme can be given by name.
#[derive(Debug, Clone)]
pub struct EvalConfigBuilder {
    zero_division: LeftOrRight<String, DivByZeroStrat>,
    scheme: LeftOrRight<String, SchemeType>,
    bio1_begin: Bio1Begin,
    parallel: bool,
}

impl Default for EvalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalConfigBuilder {
    pub fn new() -> Self {
        Self {
            zero_division: LeftOrRight::Right(DivByZeroStrat::ReplaceBy0),
            scheme: LeftOrRight::Right(SchemeType::BIOES),
            bio1_begin: Bio1Begin::Always,
            parallel: false,
        }
    }
    pub fn division_by_zero(mut self, zero_division: DivByZeroStrat) -> Self {
        self.zero_division = LeftOrRight::Right(zero_division);
        self
    }
    pub fn division_by_zero_name<S: Into<String>>(mut self, zero_division: S) -> Self {
        self.zero_division = LeftOrRight::Left(zero_division.into());
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
    pub fn bio1_begin(mut self, bio1_begin: Bio1Begin) -> Self {
        self.bio1_begin = bio1_begin;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn build(self) -> Result<EvalConfig, EvalConfigError> {
        let zero_division = self
            .zero_division
            .map_left(|name| DivByZeroStrat::from_str(&name))
            .either(|parsed| parsed, Ok)?;
        let scheme = self
            .scheme
            .map_left(|name| SchemeType::from_str(&name))
            .either(|parsed| parsed, Ok)?;
        Ok(EvalConfig {
            zero_division,
            scheme,
            bio1_begin: self.bio1_begin,
            parallel: self.parallel,
        })
    }
}
