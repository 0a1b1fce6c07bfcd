use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Help,
    Configuration,
    Environment,
    StageExecution,
}

impl ErrorCategory {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Help => 1,
            Self::Configuration => 2,
            Self::Environment => 3,
            Self::StageExecution => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("exited with status {code}")]
    ExitStatus { code: i32 },
    #[error("terminated by signal")]
    Signal,
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{action} failed: {source}")]
    Housekeeping {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("stage {stage} failed ({failure}); see {}", .log_path.display())]
pub struct StageExecutionError {
    pub stage: &'static str,
    pub log_path: PathBuf,
    pub failure: StageFailure,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("help requested")]
    HelpRequested,
    #[error("missing required argument: {flag}")]
    MissingArgument { flag: String },
    #[error("missing value for argument: {flag}")]
    MissingValue { flag: String },
    #[error("invalid value for {flag}={value}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("unsupported argument: {arg}")]
    UnsupportedArgument { arg: String },
    #[error("parse error: {message}")]
    ParseError { message: String },
    #[error("cannot read input reads {}: {reason}", .path.display())]
    UnreadableInput { path: PathBuf, reason: String },
    #[error(
        "unsupported read file extension: {} (expected .fastq, .fq, .fastq.gz or .fq.gz)",
        .path.display()
    )]
    UnsupportedExtension { path: PathBuf },
    #[error(
        "output directory {} already exists and is not empty; choose a new --outdir",
        .path.display()
    )]
    NonEmptyOutputDir { path: PathBuf },
    #[error("reference index {index} failed inspection: {reason}")]
    BadReferenceIndex { index: String, reason: String },
    #[error("stage {stage} requires {artifact}, which no earlier stage recorded")]
    MissingArtifact {
        stage: &'static str,
        artifact: &'static str,
    },
    #[error("stage {stage} cannot record {artifact}: {reason}")]
    ArtifactConflict {
        stage: &'static str,
        artifact: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Stage(#[from] StageExecutionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HelpRequested => ErrorCategory::Help,
            Self::MissingArgument { .. }
            | Self::MissingValue { .. }
            | Self::InvalidValue { .. }
            | Self::UnsupportedArgument { .. }
            | Self::ParseError { .. }
            | Self::UnreadableInput { .. }
            | Self::UnsupportedExtension { .. }
            | Self::NonEmptyOutputDir { .. } => ErrorCategory::Configuration,
            Self::BadReferenceIndex { .. } => ErrorCategory::Environment,
            Self::MissingArtifact { .. }
            | Self::ArtifactConflict { .. }
            | Self::Stage(_)
            | Self::Io(_) => ErrorCategory::StageExecution,
        }
    }

    pub fn shows_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument { .. }
                | Self::MissingValue { .. }
                | Self::UnsupportedArgument { .. }
                | Self::ParseError { .. }
        )
    }
}
