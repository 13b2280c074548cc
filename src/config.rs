//! Runtime configuration, loaded from environment variables with documented
//! defaults. This crate's persistence layer needs a database location, so
//! this module is deliberately minimal: a database URL and a log filter.

use std::env;

const DEFAULT_DB_URL: &str = "sqlite://tiny-agent-graph.db?mode=rwc";
const DEFAULT_LOG_FILTER: &str = "tiny_agent_graph=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_filter: String,
}

impl Config {
    /// Reads `TINY_AGENT_GRAPH_DB` and `RUST_LOG`, falling back to sane
    /// defaults for local development (an on-disk sqlite file next to the
    /// binary, info-level logging for this crate).
    pub fn from_env() -> Self {
        let database_url =
            env::var("TINY_AGENT_GRAPH_DB").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());
        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        Config {
            database_url,
            log_filter,
        }
    }
}
