pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod external_tools;
pub mod pipeline;
pub mod stages;

use cli::PipelineArgs;
use config::RunConfig;
use errors::Result;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

pub fn run_from_args(args: PipelineArgs) -> Result<()> {
    let config = RunConfig::validate(args)?;
    pipeline::run(&config)?;
    Ok(())
}
