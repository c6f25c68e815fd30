use std::path::PathBuf;

use thiserror::Error;

use crate::Sample;

/// Errors produced when a modification-rate cell cannot be read as a number.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateParseError {
    #[error("rate cell is empty")]
    Empty,
    #[error("rate cell '{0}' is not a number")]
    Invalid(String),
    #[error("rate cell '{0}' is not a finite number")]
    NonFinite(String),
}

/// Errors raised while reading a gene table from disk.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed JSON table {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path:?}: row {row}: {message}")]
    InvalidRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
    #[error("unsupported gene table extension: {0:?}")]
    UnsupportedExtension(PathBuf),
}

/// Errors raised while aggregating a single gene.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneError {
    #[error("gene {gene}: table has no columns for sample {sample}")]
    MissingSample { gene: String, sample: Sample },
}

/// Reasons a regression key produces no fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("insufficient data: {0} valid points, at least 2 required")]
    InsufficientData(usize),
    #[error("all x values are identical, the slope is undefined")]
    ConstantPredictor,
    #[error("cannot build a t-distribution with {0} degrees of freedom")]
    Distribution(f64),
}

/// Errors raised while writing reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write JSON {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading or validating the analysis configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("sample labels must not be empty")]
    EmptyLabel,
    #[error("sample labels must differ, both are '{0}'")]
    DuplicateLabels(String),
    #[error("rate scale must be finite and positive, got {0}")]
    InvalidRateScale(f64),
}
