//! Error types for metadata resolution, external commands and stage drivers.

use std::path::PathBuf;

use thiserror::Error;

use crate::stages::{Stage, Step};

/// Failures while resolving the application descriptor or the CI metadata.
///
/// None of these are recoverable inside a stage: a wrong application name or
/// version would target the wrong containers or mis-tag an image.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("repository path {0} does not exist or is not a directory")]
    RepoDirMissing(PathBuf),

    #[error("repository directory {0} is not a git repository")]
    NotARepository(PathBuf),

    #[error("repository {0} does not contain a descriptor file")]
    DescriptorMissing(PathBuf),

    #[error("failed to read descriptor {path}: {source}")]
    DescriptorRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse descriptor {path}: {source}")]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("application name {0:?} is empty or not safe for paths and command lines")]
    InvalidApplicationName(String),

    #[error("CI metadata directory {0} does not exist or is not a directory")]
    CiMetadataDirMissing(PathBuf),

    #[error("CI info file {0} does not exist")]
    CiInfoMissing(PathBuf),

    #[error("failed to read CI info {path}: {source}")]
    CiInfoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CI info {path}: {source}")]
    CiInfoParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read CI info {path} as YAML: {source}")]
    CiInfoSyntax {
        path: PathBuf,
        #[source]
        source: yaml_rust2::ScanError,
    },

    #[error("failed to write CI info {path}: {message}")]
    CiInfoWrite { path: PathBuf, message: String },

    #[error("invalid property: {0}")]
    InvalidProperty(String),
}

/// Failure of one external command.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}", describe_code(.code))]
    ExitStatus { program: String, code: Option<i32> },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status code {code}"),
        None => "no status code (terminated by signal)".to_string(),
    }
}

/// Failure of a stage driver. The stage stops at the step that failed and
/// never rolls back the steps that already completed.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("{stage} stage failed at step '{step}': {source}")]
    Step {
        stage: Stage,
        step: Step,
        #[source]
        source: RunnerError,
    },
}

/// Required command-line options were missing or empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing required option(s): {}", .missing.join(", "))]
pub struct UsageError {
    pub missing: Vec<&'static str>,
}
