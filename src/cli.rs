use crate::errors::{AppError, Result};
use crate::external_tools::Toolchain;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use std::path::PathBuf;

pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_MEMORY: &str = "2G";
pub const DEFAULT_MAPQ: u32 = 10;
pub const DEFAULT_ADAPTER: &str = "AGATCGGAAGAGCACACGTCT";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tagdir_pipeline",
    about = "Trim, align, filter and summarise one single-end read file into a HOMER tag directory",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct CliArgs {
    /// Input reads (.fastq, .fq, optionally .gz)
    #[arg(long = "fastq", value_name = "FILE")]
    fastq: Option<PathBuf>,
    /// bowtie2 index prefix
    #[arg(long = "bt2-index", value_name = "PATH")]
    bt2_index: Option<String>,
    /// bowtie2 options, replacing the default "--very-sensitive -p <threads>"
    #[arg(long = "bt2-opt", value_name = "STRING", allow_hyphen_values = true)]
    bt2_opt: Option<String>,
    /// Output directory; must be empty or absent
    #[arg(long = "outdir", value_name = "DIR")]
    outdir: Option<PathBuf>,
    #[arg(long = "threads", default_value = "4")]
    threads: String,
    /// Per-thread memory ceiling for samtools sort
    #[arg(long = "memory", default_value = DEFAULT_MEMORY)]
    memory: String,
    /// Minimum mapping quality kept by the filter
    #[arg(long = "mapq", default_value = "10")]
    mapq: String,
    /// 3' adapter sequence to trim
    #[arg(long = "adapter", default_value = DEFAULT_ADAPTER)]
    adapter: String,
    /// Genome passed to makeTagDirectory for GC checking
    #[arg(long = "genome")]
    genome: Option<String>,
    /// Log every command without running anything
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
    #[arg(long = "progress", action = ArgAction::SetTrue)]
    progress: bool,
    #[arg(long = "homer-tools", default_value = "homerTools")]
    homer_tools: String,
    #[arg(long = "bowtie2", default_value = "bowtie2")]
    bowtie2: String,
    #[arg(long = "bowtie2-inspect", default_value = "bowtie2-inspect")]
    bowtie2_inspect: String,
    #[arg(long = "samtools", default_value = "samtools")]
    samtools: String,
    #[arg(long = "make-tag-directory", default_value = "makeTagDirectory")]
    make_tag_directory: String,
    #[arg(long = "make-ucsc-file", default_value = "makeUCSCfile")]
    make_ucsc_file: String,
    #[arg(long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

/// Raw option values as given on the command line. Semantic checks happen in
/// [`crate::config::RunConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineArgs {
    pub fastq: Option<PathBuf>,
    pub bt2_index: Option<String>,
    pub bt2_opt: Option<String>,
    pub outdir: Option<PathBuf>,
    pub threads: usize,
    pub memory: String,
    pub mapq: u32,
    pub adapter: String,
    pub genome: Option<String>,
    pub dry_run: bool,
    pub progress: bool,
    pub tools: Toolchain,
}

impl Default for PipelineArgs {
    fn default() -> Self {
        Self {
            fastq: None,
            bt2_index: None,
            bt2_opt: None,
            outdir: None,
            threads: DEFAULT_THREADS,
            memory: DEFAULT_MEMORY.to_string(),
            mapq: DEFAULT_MAPQ,
            adapter: DEFAULT_ADAPTER.to_string(),
            genome: None,
            dry_run: false,
            progress: false,
            tools: Toolchain::default(),
        }
    }
}

pub fn usage() -> String {
    CliArgs::command().render_help().to_string()
}

pub fn parse_from_env() -> Result<PipelineArgs> {
    parse_args(std::env::args())
}

pub fn parse_args<I, S>(args: I) -> Result<PipelineArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    if tokens.is_empty() {
        tokens.push("tagdir_pipeline".to_string());
    }

    let cli = CliArgs::try_parse_from(tokens).map_err(map_clap_error)?;
    if cli.help {
        return Err(AppError::HelpRequested);
    }

    let threads = parse_usize("--threads", &cli.threads)?;
    if threads == 0 {
        return Err(AppError::InvalidValue {
            flag: "--threads".to_string(),
            value: cli.threads,
            reason: "must be at least 1".to_string(),
        });
    }
    if !is_memory_size(&cli.memory) {
        return Err(AppError::InvalidValue {
            flag: "--memory".to_string(),
            value: cli.memory,
            reason: "expected an integer with an optional K, M or G suffix".to_string(),
        });
    }
    if cli.adapter.is_empty() || !cli.adapter.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(AppError::InvalidValue {
            flag: "--adapter".to_string(),
            value: cli.adapter,
            reason: "must be a nucleotide sequence".to_string(),
        });
    }

    Ok(PipelineArgs {
        fastq: cli.fastq,
        bt2_index: cli.bt2_index,
        bt2_opt: cli.bt2_opt,
        outdir: cli.outdir,
        threads,
        mapq: parse_u32("--mapq", &cli.mapq)?,
        memory: cli.memory,
        adapter: cli.adapter.to_ascii_uppercase(),
        genome: cli.genome,
        dry_run: cli.dry_run,
        progress: cli.progress,
        tools: Toolchain {
            homer_tools: cli.homer_tools,
            bowtie2: cli.bowtie2,
            bowtie2_inspect: cli.bowtie2_inspect,
            samtools: cli.samtools,
            make_tag_directory: cli.make_tag_directory,
            make_ucsc_file: cli.make_ucsc_file,
        },
    })
}

fn is_memory_size(value: &str) -> bool {
    let digits = value.strip_suffix(['K', 'M', 'G', 'k', 'm', 'g']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn map_clap_error(error: clap::Error) -> AppError {
    let kind = error.kind();
    let rendered = error.to_string();
    match kind {
        ErrorKind::UnknownArgument => AppError::UnsupportedArgument {
            arg: first_quoted_token(&rendered).unwrap_or(rendered),
        },
        ErrorKind::TooFewValues | ErrorKind::WrongNumberOfValues | ErrorKind::InvalidValue => {
            AppError::MissingValue {
                flag: first_quoted_token(&rendered).unwrap_or_else(|| "argument".to_string()),
            }
        }
        _ => AppError::ParseError {
            message: clap_error_message(&rendered),
        },
    }
}

fn first_quoted_token(message: &str) -> Option<String> {
    let start = message.find('\'')?;
    let end = message[start + 1..].find('\'')?;
    Some(message[start + 1..start + 1 + end].to_string())
}

fn clap_error_message(message: &str) -> String {
    message
        .lines()
        .find_map(|line| line.strip_prefix("error: "))
        .or_else(|| message.lines().next())
        .unwrap_or("failed to parse arguments")
        .to_string()
}

fn parse_usize(flag: &str, value: &str) -> Result<usize> {
    value.parse::<usize>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a positive integer".to_string(),
    })
}

fn parse_u32(flag: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a non-negative integer".to_string(),
    })
}
