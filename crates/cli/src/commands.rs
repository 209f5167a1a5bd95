//! Clap command definition.
//!
//! One positional isolation level and one flag; everything else about the
//! store comes from the config file.

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};

use tally_core::{IsolationLevel, Result};
use tally_engine::{Mode, ScenarioConfig};

/// Build the CLI command.
pub fn build_cli() -> Command {
    Command::new("tally")
        .about("Two transactions increment one counter: watch what each isolation level does")
        .after_help(
            "The store is configured by the TOML file named in TALLY_CONFIG.\n\
             Logs go to stderr and are filtered with RUST_LOG (default: warn).",
        )
        .arg(
            Arg::new("isolation")
                .value_name("ISOLATION_LEVEL")
                .help(
                    "isolation level: ru (read uncommitted), rc (read committed), \
                     rr (repeatable read), s (serializable)",
                )
                .required(true)
                .value_parser(PossibleValuesParser::new(
                    IsolationLevel::ALL.map(|level| level.token()),
                )),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .short('s')
                .help(
                    "Serialize the two transactions instead of interleaving them. \
                     Serialized execution never causes a serialization error",
                )
                .action(ArgAction::SetTrue),
        )
}

/// Turn parsed arguments into a scenario configuration.
pub fn scenario_config(matches: &ArgMatches) -> Result<ScenarioConfig> {
    let isolation = matches
        .get_one::<String>("isolation")
        .map(String::as_str)
        .unwrap_or_default()
        .parse::<IsolationLevel>()?;
    let mode = if matches.get_flag("serial") {
        Mode::Serialized
    } else {
        Mode::Interleaved
    };
    Ok(ScenarioConfig::new(isolation, mode))
}
