use super::{StageKind, artifact_path};
use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::StageFailure;
use crate::external_tools::{Invocation, ToolCommand};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::info;

const MIN_READ_LENGTH: &str = "15";
const MAX_MISMATCHES: &str = "1";
const MIN_MATCH_LENGTH: &str = "4";

pub(super) fn trim_command(config: &RunConfig, ctx: &PipelineContext) -> Invocation {
    ToolCommand::new(&config.tools.homer_tools)
        .arg("trim")
        .arg("-3")
        .arg(&config.adapter_sequence)
        .arg("-mis")
        .arg(MAX_MISMATCHES)
        .arg("-minMatchLength")
        .arg(MIN_MATCH_LENGTH)
        .arg("-min")
        .arg(MIN_READ_LENGTH)
        .arg(ctx.current_read_path())
        .into()
}

/// The trimmer writes `<reads>.trimmed` and `<reads>.lengths` beside its
/// input. Both are moved into the preprocess directory under sample-scoped
/// names and the reads are gzip-compressed.
pub(super) fn collect_trimmer_outputs(ctx: &PipelineContext) -> Result<(), StageFailure> {
    let reads = ctx.current_read_path();
    let trimmed = trimmer_output(reads, "trimmed");
    let lengths = trimmer_output(reads, "lengths");
    let plain = ctx.sample_path(StageKind::Trim, ".fastq");
    let compressed = artifact_path(Artifact::TrimmedReads, ctx);
    let lengths_target = artifact_path(Artifact::ReadLengths, ctx);

    move_file(&trimmed, &plain)?;
    move_file(&lengths, &lengths_target)?;
    info!(input = %plain.display(), output = %compressed.display(), "compressing trimmed reads");
    gzip_file(&plain, &compressed).map_err(|source| StageFailure::Housekeeping {
        action: format!("compressing {}", plain.display()),
        source,
    })?;
    fs::remove_file(&plain).map_err(|source| StageFailure::Housekeeping {
        action: format!("removing {}", plain.display()),
        source,
    })
}

pub(super) fn trimmer_output(reads: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(reads.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

fn move_file(from: &Path, to: &Path) -> Result<(), StageFailure> {
    let housekeeping = |source| StageFailure::Housekeeping {
        action: format!("moving {} to {}", from.display(), to.display()),
        source,
    };
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename does not cross filesystems
    fs::copy(from, to).map_err(housekeeping)?;
    fs::remove_file(from).map_err(housekeeping)
}

fn gzip_file(input: &Path, output: &Path) -> std::io::Result<()> {
    let parent_dir = output.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = Builder::new()
        .prefix(".tagdir_pipeline_")
        .suffix(".fastq.gz.tmp")
        .tempfile_in(parent_dir)?;

    {
        let mut reader = BufReader::new(File::open(input)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(staged.as_file_mut()),
            Compression::default(),
        );
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
    }

    staged.persist(output).map_err(|error| error.error)?;
    Ok(())
}
