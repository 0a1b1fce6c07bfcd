use crate::config::RunConfig;
use crate::errors::{AppError, Result};
use crate::stages::StageKind;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Files and directories produced by the stages, in production order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Artifact {
    TrimmedReads,
    ReadLengths,
    Alignment,
    Bam,
    SortedFilteredBam,
    TagDirectory,
    Track,
}

impl Artifact {
    pub const ALL: [Artifact; 7] = [
        Artifact::TrimmedReads,
        Artifact::ReadLengths,
        Artifact::Alignment,
        Artifact::Bam,
        Artifact::SortedFilteredBam,
        Artifact::TagDirectory,
        Artifact::Track,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TrimmedReads => "trimmed reads",
            Self::ReadLengths => "read length report",
            Self::Alignment => "SAM alignment",
            Self::Bam => "BAM alignment",
            Self::SortedFilteredBam => "sorted filtered BAM",
            Self::TagDirectory => "tag directory",
            Self::Track => "browser track",
        }
    }

    /// The only stage allowed to record this artifact.
    pub fn owner(self) -> StageKind {
        match self {
            Self::TrimmedReads | Self::ReadLengths => StageKind::Trim,
            Self::Alignment => StageKind::Align,
            Self::Bam => StageKind::ConvertAlignment,
            Self::SortedFilteredBam => StageKind::SortFilter,
            Self::TagDirectory => StageKind::BuildTagDirectory,
            Self::Track => StageKind::BuildTrack,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run state threaded through the stage sequence. Artifact paths only grow:
/// each is written once, by its owning stage.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    sample_basename: String,
    input_read_path: PathBuf,
    output_root_dir: PathBuf,
    artifacts: BTreeMap<Artifact, PathBuf>,
}

impl PipelineContext {
    pub fn new(config: &RunConfig) -> Result<Self> {
        Ok(Self {
            sample_basename: config.sample_basename()?,
            input_read_path: config.input_read_path.clone(),
            output_root_dir: config.output_root_dir.clone(),
            artifacts: BTreeMap::new(),
        })
    }

    pub fn sample_basename(&self) -> &str {
        &self.sample_basename
    }

    pub fn input_read_path(&self) -> &Path {
        &self.input_read_path
    }

    /// The input reads until Trim records its output, the trimmed reads after.
    pub fn current_read_path(&self) -> &Path {
        self.artifact(Artifact::TrimmedReads)
            .unwrap_or(self.input_read_path.as_path())
    }

    pub fn stage_dir(&self, stage: StageKind) -> PathBuf {
        self.output_root_dir.join(stage.descriptor().subdir)
    }

    /// `<stage dir>/<sample><suffix>`
    pub fn sample_path(&self, stage: StageKind, suffix: &str) -> PathBuf {
        self.stage_dir(stage)
            .join(format!("{}{suffix}", self.sample_basename))
    }

    pub fn artifact(&self, artifact: Artifact) -> Option<&Path> {
        self.artifacts.get(&artifact).map(PathBuf::as_path)
    }

    pub fn require(&self, stage: StageKind, artifact: Artifact) -> Result<&Path> {
        self.artifact(artifact)
            .ok_or_else(|| AppError::MissingArtifact {
                stage: stage.name(),
                artifact: artifact.name(),
            })
    }

    pub fn record(&mut self, stage: StageKind, artifact: Artifact, path: PathBuf) -> Result<()> {
        if artifact.owner() != stage {
            return Err(AppError::ArtifactConflict {
                stage: stage.name(),
                artifact: artifact.name(),
                reason: format!("owned by stage {}", artifact.owner().name()),
            });
        }
        if let Some(existing) = self.artifacts.get(&artifact) {
            return Err(AppError::ArtifactConflict {
                stage: stage.name(),
                artifact: artifact.name(),
                reason: format!("already recorded as {}", existing.display()),
            });
        }
        self.artifacts.insert(artifact, path);
        Ok(())
    }

    pub fn recorded(&self) -> impl Iterator<Item = (Artifact, &Path)> {
        self.artifacts
            .iter()
            .map(|(artifact, path)| (*artifact, path.as_path()))
    }
}
