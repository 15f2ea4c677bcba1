use clap::Parser;

use crate::config::{LogLevel, DEFAULT_CONFIG_FILE_NAME};

#[derive(Debug, Parser)]
#[clap(name = "routeplan", version = env!("CARGO_PKG_VERSION"))]
pub enum Routeplan {
    Explain(Explain),
}

////////////////////////////////////////////////////////////////////////////////
// Explain
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Parser)]
#[clap(about = "Split a SELECT statement into per-shard routes and print the plan")]
pub struct Explain {
    #[clap(
        long,
        value_name = "path",
        default_value = DEFAULT_CONFIG_FILE_NAME,
        env = "ROUTEPLAN_CONFIG"
    )]
    /// Configuration file with the keyspace schema
    pub config: String,

    #[clap(
        long = "log-level",
        value_name = "level",
        possible_values = LogLevel::VARIANTS,
        env = "ROUTEPLAN_LOG_LEVEL"
    )]
    /// Log level, overrides the one from the configuration file
    pub log_level: Option<LogLevel>,

    /// SELECT statement to plan
    pub sql: String,
}
