//! tally CLI: run the two-transaction counter scenario once.
//!
//! ```text
//! tally <ru|rc|rr|s> [--serial]
//! ```
//!
//! Exit codes: 0 on success (a write conflict in interleaved mode is a
//! success), 2 for invalid arguments or config, 1 for store failures.

mod commands;
mod format;

use std::process;

use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tally_core::{Error, Result, TransactionalStore};
use tally_engine::{
    Backend, Database, Scenario, ScenarioConfig, ScenarioReport, ScenarioStep, StoreConfig,
};

use commands::{build_cli, scenario_config};
use format::{format_error, format_header, format_report, format_step};

fn main() {
    init_tracing();

    // Usage errors exit with clap's code 2
    let matches = build_cli().get_matches();

    let mut steps = Vec::new();
    let loaded = load(&matches);
    let header = loaded.as_ref().ok().map(|(_, config)| format_header(config));
    let code = match loaded.and_then(|(store, config)| run(&store, config, &mut steps)) {
        Ok(report) => {
            print!("{}", format_report(&report));
            0
        }
        Err(e) => {
            // Show how far the run got before it failed
            if let Some(header) = header {
                print!("{}", header);
                for step in &steps {
                    println!("{}", format_step(step));
                }
            }
            error!(error = %e, "scenario failed");
            eprintln!("{}", format_error(&e));
            exit_code(&e)
        }
    };
    process::exit(code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(matches: &clap::ArgMatches) -> Result<(StoreConfig, ScenarioConfig)> {
    let config = scenario_config(matches)?;
    let store = StoreConfig::from_env()?;
    debug!(backend = ?store.backend, isolation = %config.isolation, mode = %config.mode, "configured");
    Ok((store, config))
}

fn run(store: &StoreConfig, config: ScenarioConfig, steps: &mut Vec<ScenarioStep>) -> Result<ScenarioReport> {
    match store.backend {
        Backend::Memory => run_on(&Database::from_config(store), config, steps),
        Backend::Sqlite => run_sqlite(store, config, steps),
    }
}

fn run_on<S: TransactionalStore>(
    store: &S,
    config: ScenarioConfig,
    steps: &mut Vec<ScenarioStep>,
) -> Result<ScenarioReport> {
    Scenario::new(store, config)
        .on_step(|step| steps.push(*step))
        .run()
}

#[cfg(feature = "sqlite")]
fn run_sqlite(store: &StoreConfig, config: ScenarioConfig, steps: &mut Vec<ScenarioStep>) -> Result<ScenarioReport> {
    let path = store
        .sqlite_path
        .as_deref()
        .ok_or_else(|| Error::Config("backend \"sqlite\" requires sqlite_path".to_string()))?;
    let sqlite = tally_engine::SqliteStore::open(path)?;
    run_on(&sqlite, config, steps)
}

#[cfg(not(feature = "sqlite"))]
fn run_sqlite(
    _store: &StoreConfig,
    _config: ScenarioConfig,
    _steps: &mut Vec<ScenarioStep>,
) -> Result<ScenarioReport> {
    Err(Error::Config(
        "backend \"sqlite\" is not available: tally was built without the sqlite feature"
            .to_string(),
    ))
}

fn exit_code(err: &Error) -> i32 {
    if err.is_config() {
        2
    } else {
        1
    }
}
