use registry_gc::{Collector, GcConfig, GcJobParams, JobParameters};
use shared::db::DatabasePool;
use std::env;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing::{error, info};

/// Reads the job parameter map from a `GC_JOB_PARAMS` env var holding a JSON
/// object, the way the job-scheduling framework this binary plugs into would
/// hand it a `map[string]interface{}` payload. Absent entirely, the run
/// proceeds with every parameter at its default.
fn load_job_parameters() -> JobParameters {
    match env::var("GC_JOB_PARAMS") {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => JobParameters::default(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = match GcConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let params = match GcJobParams::try_from(load_job_parameters()) {
        Ok(params) => params,
        Err(err) => {
            error!("failed to parse GC job parameters: {err}");
            return ExitCode::FAILURE;
        }
    };

    let db_pool = match DatabasePool::new(&config.database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("failed to connect to the metadata database: {err}");
            return ExitCode::FAILURE;
        }
    };

    let collector = Collector::new(&config, params, &db_pool);
    let stop_signal = AtomicBool::new(false);

    match collector.run(&stop_signal).await {
        Ok(summary) => {
            info!(?summary, "garbage collection run complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("garbage collection run failed: {err}");
            ExitCode::FAILURE
        }
    }
}
