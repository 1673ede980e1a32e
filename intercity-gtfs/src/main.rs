use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use intercity_gtfs::config::PipelineConfig;
use intercity_gtfs::pipeline::Pipeline;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: INTERCITY_INPUT=KPD_Rozklad.zip intercity-gtfs");
            return ExitCode::FAILURE;
        }
    };

    info!(input = %config.input.display(), output = %config.output.display(), "converting schedule");

    match Pipeline::new(config).run().await {
        Ok(summary) => {
            info!(
                runs = summary.runs,
                trips = summary.stats.trips,
                stop_times = summary.stats.stop_times,
                unmatched = summary.unmatched,
                skipped = summary.diagnostics.skipped(),
                truncated = summary.diagnostics.truncated(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "conversion failed, nothing written");
            ExitCode::FAILURE
        }
    }
}
