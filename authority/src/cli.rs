//! # CLI Interface
//!
//! Defines the command-line argument structure for `veil-authority` using
//! `clap` derive. Supports three subcommands: `run`, `params`, and
//! `version`.

use clap::{Parser, Subcommand};

/// VEIL Trust Authority server.
///
/// Holds the identity-based-encryption master secret, serves public
/// parameters, and issues per-identity private keys behind a two-factor
/// registration protocol.
#[derive(Parser, Debug)]
#[command(
    name = "veil-authority",
    about = "VEIL Trust Authority server",
    version,
    propagate_version = true
)]
pub struct VeilAuthorityCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the authority binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Trust Authority server.
    Run(RunArgs),
    /// Generate a fresh parameter set and print the public subset as JSON.
    /// Useful for smoke-testing client parsers; the master secret is
    /// discarded on exit.
    Params,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API.
    #[arg(long, env = "VEIL_HTTP_PORT", default_value_t = 8717)]
    pub http_port: u16,

    /// Address to bind the HTTP listener on.
    #[arg(long, env = "VEIL_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Issuer name shown in authenticator apps and provisioning URIs.
    #[arg(long, env = "VEIL_ISSUER", default_value = "VEIL Trust Authority")]
    pub issuer: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "VEIL_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        VeilAuthorityCli::command().debug_assert();
    }
}
