use super::{StageKind, artifact_path};
use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::{Result, StageFailure};
use crate::external_tools::{Invocation, ToolCommand};
use std::fs;
use std::path::Path;
use tracing::info;

/// Prefix handed to `samtools sort -T`; sort writes `tmp.NNNN.bam` chunks.
const SORT_TEMP_PREFIX: &str = "tmp";

pub(super) fn sort_filter_command(config: &RunConfig, ctx: &PipelineContext) -> Result<Invocation> {
    let bam = ctx.require(StageKind::SortFilter, Artifact::Bam)?;
    let temp_prefix = ctx.stage_dir(StageKind::SortFilter).join(SORT_TEMP_PREFIX);

    let filter = ToolCommand::new(&config.tools.samtools)
        .arg("view")
        .arg("-b")
        .arg("-q")
        .arg(config.mapq_minimum.to_string())
        .arg(bam);
    let sort = ToolCommand::new(&config.tools.samtools)
        .arg("sort")
        .arg("-@")
        .arg(config.thread_count.to_string())
        .arg("-m")
        .arg(&config.memory_ceiling)
        .arg("-T")
        .arg(temp_prefix)
        .arg("-o")
        .arg(artifact_path(Artifact::SortedFilteredBam, ctx))
        .arg("-");
    Ok(Invocation::single(filter).pipe(sort))
}

/// Deletes sort temp files left by an earlier attempt. Runs before the sort,
/// never after, so a failed sort keeps its own temp files.
pub(super) fn remove_stale_temp_files(dir: &Path) -> std::result::Result<(), StageFailure> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(StageFailure::Housekeeping {
                action: format!("listing {}", dir.display()),
                source,
            });
        }
    };

    for entry in entries.filter_map(|entry| entry.ok()) {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !is_sort_temp_file(&name) {
            continue;
        }
        let path = entry.path();
        info!(path = %path.display(), "removing stale sort temp file");
        fs::remove_file(&path).map_err(|source| StageFailure::Housekeeping {
            action: format!("removing {}", path.display()),
            source,
        })?;
    }
    Ok(())
}

fn is_sort_temp_file(name: &str) -> bool {
    name.strip_prefix(SORT_TEMP_PREFIX)
        .and_then(|rest| rest.strip_suffix(".bam"))
        .is_some_and(|middle| middle.is_empty() || middle.starts_with('.'))
}
