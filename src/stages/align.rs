use super::{StageKind, artifact_path};
use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::{Result, StageFailure};
use crate::external_tools::{Invocation, ToolCommand};
use std::fs;
use tracing::info;

pub(super) fn align_command(config: &RunConfig, ctx: &PipelineContext) -> Result<Invocation> {
    let reads = ctx.require(StageKind::Align, Artifact::TrimmedReads)?;
    Ok(ToolCommand::new(&config.tools.bowtie2)
        .args(&config.aligner_options)
        .arg("-x")
        .arg(&config.reference_index_path)
        .arg("-U")
        .arg(reads)
        .arg("-S")
        .arg(artifact_path(Artifact::Alignment, ctx))
        .into())
}

pub(super) fn convert_command(config: &RunConfig, ctx: &PipelineContext) -> Result<Invocation> {
    let sam = ctx.require(StageKind::ConvertAlignment, Artifact::Alignment)?;
    Ok(ToolCommand::new(&config.tools.samtools)
        .arg("view")
        .arg("-b")
        .arg("-o")
        .arg(artifact_path(Artifact::Bam, ctx))
        .arg(sam)
        .into())
}

/// The SAM is only an intermediate; drop it once the BAM exists.
pub(super) fn remove_text_alignment(ctx: &PipelineContext) -> std::result::Result<(), StageFailure> {
    let Some(sam) = ctx.artifact(Artifact::Alignment) else {
        return Ok(());
    };
    info!(path = %sam.display(), "removing text alignment");
    match fs::remove_file(sam) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StageFailure::Housekeeping {
            action: format!("removing {}", sam.display()),
            source,
        }),
    }
}
