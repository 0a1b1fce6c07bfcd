//! The fixed stage sequence and its transition table.
//!
//! Every stage declares the artifacts it reads and the artifacts it records.
//! Stage bodies only build commands and do local file housekeeping; running
//! the tools, recording artifacts and deciding whether to abort belong to
//! [`crate::pipeline`].

mod align;
mod homer;
mod preprocess;
mod samtools;

use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::{Result, StageFailure};
use crate::external_tools::Invocation;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Trim,
    Align,
    ConvertAlignment,
    SortFilter,
    BuildTagDirectory,
    BuildTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogName {
    /// `<sample><suffix>` inside the stage directory.
    PerSample(&'static str),
    Fixed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub name: &'static str,
    pub subdir: &'static str,
    pub log: LogName,
    pub requires: &'static [Artifact],
    pub produces: &'static [Artifact],
}

pub static STAGES: [StageDescriptor; 6] = [
    StageDescriptor {
        kind: StageKind::Trim,
        name: "trim",
        subdir: "preprocess",
        log: LogName::PerSample("_trim.out"),
        requires: &[],
        produces: &[Artifact::TrimmedReads, Artifact::ReadLengths],
    },
    StageDescriptor {
        kind: StageKind::Align,
        name: "align",
        subdir: "align",
        log: LogName::PerSample("_bt2.out"),
        requires: &[Artifact::TrimmedReads],
        produces: &[Artifact::Alignment],
    },
    StageDescriptor {
        kind: StageKind::ConvertAlignment,
        name: "convert_alignment",
        subdir: "align",
        log: LogName::PerSample("_bam.out"),
        requires: &[Artifact::Alignment],
        produces: &[Artifact::Bam],
    },
    StageDescriptor {
        kind: StageKind::SortFilter,
        name: "sort_filter",
        subdir: "samtools",
        log: LogName::PerSample("_sort_filter.out"),
        requires: &[Artifact::Bam],
        produces: &[Artifact::SortedFilteredBam],
    },
    StageDescriptor {
        kind: StageKind::BuildTagDirectory,
        name: "build_tag_directory",
        subdir: "homer",
        log: LogName::Fixed("maketagdirectory.out"),
        requires: &[Artifact::SortedFilteredBam],
        produces: &[Artifact::TagDirectory],
    },
    StageDescriptor {
        kind: StageKind::BuildTrack,
        name: "build_track",
        subdir: "homer",
        log: LogName::Fixed("makeucscfile_out"),
        requires: &[Artifact::TagDirectory],
        produces: &[Artifact::Track],
    },
];

impl StageKind {
    pub const SEQUENCE: [StageKind; 6] = [
        StageKind::Trim,
        StageKind::Align,
        StageKind::ConvertAlignment,
        StageKind::SortFilter,
        StageKind::BuildTagDirectory,
        StageKind::BuildTrack,
    ];

    pub fn descriptor(self) -> &'static StageDescriptor {
        &STAGES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn log_path(self, ctx: &PipelineContext) -> PathBuf {
        match self.descriptor().log {
            LogName::PerSample(suffix) => ctx.sample_path(self, suffix),
            LogName::Fixed(name) => ctx.stage_dir(self).join(name),
        }
    }

    /// Housekeeping that must happen before the tool runs.
    pub fn prepare(self, ctx: &PipelineContext) -> std::result::Result<(), StageFailure> {
        match self {
            Self::SortFilter => samtools::remove_stale_temp_files(&ctx.stage_dir(self)),
            _ => Ok(()),
        }
    }

    pub fn command(self, config: &RunConfig, ctx: &PipelineContext) -> Result<Invocation> {
        match self {
            Self::Trim => Ok(preprocess::trim_command(config, ctx)),
            Self::Align => align::align_command(config, ctx),
            Self::ConvertAlignment => align::convert_command(config, ctx),
            Self::SortFilter => samtools::sort_filter_command(config, ctx),
            Self::BuildTagDirectory => homer::tag_directory_command(config, ctx),
            Self::BuildTrack => homer::track_command(config, ctx),
        }
    }

    /// Housekeeping after the tool succeeded, before artifacts are recorded.
    pub fn finalize(self, ctx: &PipelineContext) -> std::result::Result<(), StageFailure> {
        match self {
            Self::Trim => preprocess::collect_trimmer_outputs(ctx),
            Self::ConvertAlignment => align::remove_text_alignment(ctx),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where each artifact lands under the output root.
pub fn artifact_path(artifact: Artifact, ctx: &PipelineContext) -> PathBuf {
    let owner = artifact.owner();
    match artifact {
        Artifact::TrimmedReads => ctx.sample_path(owner, ".fastq.gz"),
        Artifact::ReadLengths => ctx.sample_path(owner, "_lengths.txt"),
        Artifact::Alignment => ctx.sample_path(owner, ".sam"),
        Artifact::Bam => ctx.sample_path(owner, ".bam"),
        Artifact::SortedFilteredBam => ctx.sample_path(owner, ".bam"),
        Artifact::TagDirectory => ctx.stage_dir(owner),
        Artifact::Track => homer::auto_track_path(&ctx.stage_dir(StageKind::BuildTagDirectory)),
    }
}

#[cfg(test)]
mod tests {
    use super::{STAGES, StageKind, artifact_path};
    use crate::cli::PipelineArgs;
    use crate::config::{RunConfig, default_aligner_options};
    use crate::context::{Artifact, PipelineContext};
    use crate::external_tools::Toolchain;
    use std::path::PathBuf;

    fn test_config(outdir: &str) -> RunConfig {
        let defaults = PipelineArgs::default();
        RunConfig {
            input_read_path: PathBuf::from("reads/sample.fastq.gz"),
            reference_index_path: "idx/hg38".to_string(),
            output_root_dir: PathBuf::from(outdir),
            thread_count: 4,
            memory_ceiling: defaults.memory,
            mapq_minimum: defaults.mapq,
            aligner_options: default_aligner_options(4),
            adapter_sequence: defaults.adapter,
            genome: None,
            dry_run: false,
            progress: false,
            tools: Toolchain::default(),
        }
    }

    fn args_of(stage: StageKind, ctx: &PipelineContext, config: &RunConfig) -> Vec<Vec<String>> {
        stage
            .command(config, ctx)
            .expect("expected command")
            .steps()
            .iter()
            .map(|step| {
                std::iter::once(step.program().to_string())
                    .chain(
                        step.arguments()
                            .iter()
                            .map(|arg| arg.to_string_lossy().to_string()),
                    )
                    .collect()
            })
            .collect()
    }

    fn record_through(ctx: &mut PipelineContext, last: StageKind) {
        for stage in StageKind::SEQUENCE {
            for artifact in stage.descriptor().produces {
                let path = artifact_path(*artifact, ctx);
                ctx.record(stage, *artifact, path).expect("expected record");
            }
            if stage == last {
                break;
            }
        }
    }

    #[test]
    fn table_order_matches_sequence() {
        for (index, stage) in StageKind::SEQUENCE.iter().enumerate() {
            assert_eq!(STAGES[index].kind, *stage);
        }
    }

    #[test]
    fn every_requirement_is_produced_earlier() {
        for (index, descriptor) in STAGES.iter().enumerate() {
            for artifact in descriptor.requires {
                let producer = STAGES[..index]
                    .iter()
                    .position(|earlier| earlier.produces.contains(artifact));
                assert!(producer.is_some(), "{} requires {artifact}", descriptor.name);
            }
            for artifact in descriptor.produces {
                assert_eq!(artifact.owner(), descriptor.kind);
            }
        }
        for artifact in Artifact::ALL {
            assert!(STAGES.iter().any(|d| d.produces.contains(&artifact)));
        }
    }

    #[test]
    fn log_paths_follow_layout() {
        let config = test_config("out");
        let ctx = PipelineContext::new(&config).expect("expected context");
        let logs: Vec<PathBuf> = StageKind::SEQUENCE
            .iter()
            .map(|stage| stage.log_path(&ctx))
            .collect();
        assert_eq!(
            logs,
            vec![
                PathBuf::from("out/preprocess/sample_trim.out"),
                PathBuf::from("out/align/sample_bt2.out"),
                PathBuf::from("out/align/sample_bam.out"),
                PathBuf::from("out/samtools/sample_sort_filter.out"),
                PathBuf::from("out/homer/maketagdirectory.out"),
                PathBuf::from("out/homer/makeucscfile_out"),
            ]
        );
    }

    #[test]
    fn trim_command_uses_fixed_parameters() {
        let config = test_config("out");
        let ctx = PipelineContext::new(&config).expect("expected context");
        let commands = args_of(StageKind::Trim, &ctx, &config);
        assert_eq!(
            commands,
            vec![vec![
                "homerTools",
                "trim",
                "-3",
                "AGATCGGAAGAGCACACGTCT",
                "-mis",
                "1",
                "-minMatchLength",
                "4",
                "-min",
                "15",
                "reads/sample.fastq.gz",
            ]]
        );
    }

    #[test]
    fn align_reads_trimmed_output() {
        let config = test_config("out");
        let mut ctx = PipelineContext::new(&config).expect("expected context");
        assert!(StageKind::Align.command(&config, &ctx).is_err());

        record_through(&mut ctx, StageKind::Trim);
        let commands = args_of(StageKind::Align, &ctx, &config);
        assert_eq!(
            commands,
            vec![vec![
                "bowtie2",
                "--very-sensitive",
                "-p",
                "4",
                "-x",
                "idx/hg38",
                "-U",
                "out/preprocess/sample.fastq.gz",
                "-S",
                "out/align/sample.sam",
            ]]
        );
    }

    #[test]
    fn sort_filter_pipes_view_into_sort() {
        let mut config = test_config("out");
        config.mapq_minimum = 30;
        config.thread_count = 8;
        config.memory_ceiling = "4G".to_string();
        let mut ctx = PipelineContext::new(&config).expect("expected context");
        record_through(&mut ctx, StageKind::ConvertAlignment);

        let commands = args_of(StageKind::SortFilter, &ctx, &config);
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            vec!["samtools", "view", "-b", "-q", "30", "out/align/sample.bam"]
        );
        assert_eq!(
            commands[1],
            vec![
                "samtools",
                "sort",
                "-@",
                "8",
                "-m",
                "4G",
                "-T",
                "out/samtools/tmp",
                "-o",
                "out/samtools/sample.bam",
                "-",
            ]
        );
    }

    #[test]
    fn homer_commands_target_tag_directory() {
        let mut config = test_config("out");
        config.genome = Some("hg38".to_string());
        let mut ctx = PipelineContext::new(&config).expect("expected context");
        record_through(&mut ctx, StageKind::BuildTagDirectory);

        let tagdir = args_of(StageKind::BuildTagDirectory, &ctx, &config);
        assert_eq!(
            tagdir,
            vec![vec![
                "makeTagDirectory",
                "out/homer",
                "out/samtools/sample.bam",
                "-checkGC",
                "-genome",
                "hg38",
            ]]
        );
        let track = args_of(StageKind::BuildTrack, &ctx, &config);
        assert_eq!(
            track,
            vec![vec!["makeUCSCfile", "out/homer", "-strand", "separate", "-o", "auto"]]
        );
        assert_eq!(
            artifact_path(Artifact::Track, &ctx),
            PathBuf::from("out/homer/homer.ucsc.bedGraph.gz")
        );
    }
}
