use crate::config::RunConfig;
use crate::context::{Artifact, PipelineContext};
use crate::errors::{Result, StageExecutionError, StageFailure};
use crate::external_tools;
use crate::stages::{StageKind, artifact_path};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Runs every stage in order and stops at the first failure. Artifacts of
/// completed stages stay on disk.
pub fn run(config: &RunConfig) -> Result<PipelineContext> {
    let mut ctx = PipelineContext::new(config)?;
    info!(
        sample = %ctx.sample_basename(),
        input = %config.input_read_path.display(),
        index = %config.reference_index_path,
        output = %config.output_root_dir.display(),
        threads = config.thread_count,
        dry_run = config.dry_run,
        "starting pipeline run"
    );

    if !config.dry_run {
        fs::create_dir_all(&config.output_root_dir)?;
    }

    let mut progress = PipelineProgress::new(config.progress, ctx.sample_basename());
    let run_started = Instant::now();
    for (position, stage) in StageKind::SEQUENCE.into_iter().enumerate() {
        progress.on_stage_started(position, stage);
        let started = Instant::now();
        if config.dry_run {
            plan_stage(stage, config, &mut ctx)?;
        } else {
            run_stage(stage, config, &mut ctx)?;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(stage = stage.name(), elapsed_ms, "stage completed");
    }
    progress.finish();

    let track = ctx
        .artifact(Artifact::Track)
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let elapsed_ms = run_started.elapsed().as_millis() as u64;
    info!(
        sample = %ctx.sample_basename(),
        track = %track,
        elapsed_ms,
        "pipeline run completed"
    );
    Ok(ctx)
}

/// Executes one stage against `ctx`: check inputs, create the stage
/// directory, run the tool and record what it produced.
pub fn run_stage(stage: StageKind, config: &RunConfig, ctx: &mut PipelineContext) -> Result<()> {
    let descriptor = stage.descriptor();
    for artifact in descriptor.requires {
        ctx.require(stage, *artifact)?;
    }

    let log_path = stage.log_path(ctx);
    let stage_dir = ctx.stage_dir(stage);
    fs::create_dir_all(&stage_dir).map_err(|source| {
        stage_error(
            stage,
            &log_path,
            StageFailure::Housekeeping {
                action: format!("creating {}", stage_dir.display()),
                source,
            },
        )
    })?;

    stage
        .prepare(ctx)
        .map_err(|failure| stage_error(stage, &log_path, failure))?;
    let invocation = stage.command(config, ctx)?;
    external_tools::invoke(stage.name(), &invocation, &log_path)?;
    stage
        .finalize(ctx)
        .map_err(|failure| stage_error(stage, &log_path, failure))?;

    record_outputs(stage, ctx)
}

/// Logs what [`run_stage`] would execute and records the planned artifacts
/// without touching the filesystem.
pub fn plan_stage(stage: StageKind, config: &RunConfig, ctx: &mut PipelineContext) -> Result<()> {
    for artifact in stage.descriptor().requires {
        ctx.require(stage, *artifact)?;
    }
    let invocation = stage.command(config, ctx)?;
    let log_path = stage.log_path(ctx);
    info!(
        stage = stage.name(),
        command = %invocation,
        log = %log_path.display(),
        "dry run: would execute"
    );
    record_outputs(stage, ctx)
}

fn record_outputs(stage: StageKind, ctx: &mut PipelineContext) -> Result<()> {
    for artifact in stage.descriptor().produces {
        let path = artifact_path(*artifact, ctx);
        info!(stage = stage.name(), artifact = artifact.name(), path = %path.display(), "recorded artifact");
        ctx.record(stage, *artifact, path)?;
    }
    Ok(())
}

fn stage_error(stage: StageKind, log_path: &Path, failure: StageFailure) -> StageExecutionError {
    StageExecutionError {
        stage: stage.name(),
        log_path: log_path.to_path_buf(),
        failure,
    }
}

struct PipelineProgress {
    progress_bar: Option<ProgressBar>,
    finished: bool,
}

impl PipelineProgress {
    fn new(enabled: bool, sample: &str) -> Self {
        let progress_bar = if enabled {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
            let style = ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(200));
            bar.set_message(format!("starting sample={sample}"));
            Some(bar)
        } else {
            None
        };

        Self {
            progress_bar,
            finished: false,
        }
    }

    fn on_stage_started(&self, position: usize, stage: StageKind) {
        if let Some(bar) = &self.progress_bar {
            bar.set_message(format!(
                "stage {}/{} {stage}",
                position + 1,
                StageKind::SEQUENCE.len()
            ));
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = &self.progress_bar {
            bar.finish_with_message("done");
        }
        self.finished = true;
    }
}

impl Drop for PipelineProgress {
    fn drop(&mut self) {
        if !self.finished
            && let Some(bar) = &self.progress_bar
        {
            bar.finish_and_clear();
        }
    }
}
