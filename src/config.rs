use crate::cli::PipelineArgs;
use crate::errors::{AppError, Result};
use crate::external_tools::Toolchain;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const READ_SUFFIXES: [&str; 4] = [".fastq.gz", ".fq.gz", ".fastq", ".fq"];

/// Validated inputs for one run. Constructed only through [`RunConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input_read_path: PathBuf,
    pub reference_index_path: String,
    pub output_root_dir: PathBuf,
    pub thread_count: usize,
    pub memory_ceiling: String,
    pub mapq_minimum: u32,
    pub aligner_options: Vec<String>,
    pub adapter_sequence: String,
    pub genome: Option<String>,
    pub dry_run: bool,
    pub progress: bool,
    pub tools: Toolchain,
}

impl RunConfig {
    /// Checks run in a fixed order and the first failure wins. Nothing is
    /// created on disk.
    pub fn validate(args: PipelineArgs) -> Result<Self> {
        let input_read_path = args.fastq.ok_or_else(|| missing("--fastq"))?;
        let reference_index_path = args.bt2_index.ok_or_else(|| missing("--bt2-index"))?;
        let output_root_dir = args.outdir.ok_or_else(|| missing("--outdir"))?;

        check_readable(&input_read_path)?;
        sample_basename(&input_read_path)?;
        check_output_dir(&output_root_dir)?;
        args.tools.inspect_index(&reference_index_path)?;

        let aligner_options = match args.bt2_opt {
            Some(options) => options.split_whitespace().map(str::to_string).collect(),
            None => default_aligner_options(args.threads),
        };

        Ok(Self {
            input_read_path,
            reference_index_path,
            output_root_dir,
            thread_count: args.threads,
            memory_ceiling: args.memory,
            mapq_minimum: args.mapq,
            aligner_options,
            adapter_sequence: args.adapter,
            genome: args.genome,
            dry_run: args.dry_run,
            progress: args.progress,
            tools: args.tools,
        })
    }

    pub fn sample_basename(&self) -> Result<String> {
        sample_basename(&self.input_read_path)
    }
}

pub fn default_aligner_options(threads: usize) -> Vec<String> {
    vec![
        "--very-sensitive".to_string(),
        "-p".to_string(),
        threads.to_string(),
    ]
}

/// File name of `path` with a recognised read suffix removed.
pub fn sample_basename(path: &Path) -> Result<String> {
    let unsupported = || AppError::UnsupportedExtension {
        path: path.to_path_buf(),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(unsupported)?;
    READ_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(unsupported)
}

fn missing(flag: &str) -> AppError {
    AppError::MissingArgument {
        flag: flag.to_string(),
    }
}

fn check_readable(path: &Path) -> Result<()> {
    let unreadable = |reason: String| AppError::UnreadableInput {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = fs::metadata(path).map_err(|err| unreadable(err.to_string()))?;
    if !metadata.is_file() {
        return Err(unreadable("not a regular file".to_string()));
    }
    File::open(path).map_err(|err| unreadable(err.to_string()))?;
    Ok(())
}

fn check_output_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let non_empty = || AppError::NonEmptyOutputDir {
        path: path.to_path_buf(),
    };
    if !path.is_dir() {
        return Err(non_empty());
    }
    if fs::read_dir(path)?.next().is_some() {
        return Err(non_empty());
    }
    Ok(())
}
