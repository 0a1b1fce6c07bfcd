use super::{StageKind, artifact_path};
use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::Result;
use crate::external_tools::{Invocation, ToolCommand};
use std::path::{Path, PathBuf};

pub(super) fn tag_directory_command(
    config: &RunConfig,
    ctx: &PipelineContext,
) -> Result<Invocation> {
    let bam = ctx.require(StageKind::BuildTagDirectory, Artifact::SortedFilteredBam)?;
    let mut command = ToolCommand::new(&config.tools.make_tag_directory)
        .arg(artifact_path(Artifact::TagDirectory, ctx))
        .arg(bam)
        .arg("-checkGC");
    if let Some(genome) = &config.genome {
        command = command.arg("-genome").arg(genome);
    }
    Ok(command.into())
}

pub(super) fn track_command(config: &RunConfig, ctx: &PipelineContext) -> Result<Invocation> {
    let tag_directory = ctx.require(StageKind::BuildTrack, Artifact::TagDirectory)?;
    Ok(ToolCommand::new(&config.tools.make_ucsc_file)
        .arg(tag_directory)
        .args(["-strand", "separate", "-o", "auto"])
        .into())
}

/// File name makeUCSCfile picks for `-o auto`.
pub(super) fn auto_track_path(tag_directory: &Path) -> PathBuf {
    let name = tag_directory
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    tag_directory.join(format!("{name}.ucsc.bedGraph.gz"))
}
