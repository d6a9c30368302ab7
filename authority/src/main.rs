// Copyright (c) 2026 VEIL Contributors. MIT License.
// See LICENSE for details.

//! # VEIL Trust Authority
//!
//! Entry point for the `veil-authority` binary. Parses CLI arguments,
//! initializes logging, constructs the authority (which generates the
//! master secret in memory), and serves the HTTP API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the Trust Authority server
//! - `params`  — generate a parameter set and print the public subset
//! - `version` — print build version information
//!
//! The master secret lives only in process memory and dies with the
//! process. Restarting the server therefore invalidates all previously
//! issued keys and published parameters; persistence is a deployment
//! concern layered on `TrustAuthority::with_parameters`.

mod api;
mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use veil_protocol::config::PROTOCOL_VERSION;
use veil_protocol::ibe::params::AuthorityParameters;
use veil_protocol::mail::LogMailer;
use veil_protocol::registry::MemoryAccountStore;
use veil_protocol::TrustAuthority;

use cli::{Commands, VeilAuthorityCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VeilAuthorityCli::parse();

    match cli.command {
        Commands::Run(args) => run_authority(args).await,
        Commands::Params => print_params(),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full Trust Authority: parameter generation, registration
/// protocol, and the HTTP API.
async fn run_authority(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "veil_authority=info,veil_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        http_port = args.http_port,
        bind_addr = %args.bind_addr,
        issuer = %args.issuer,
        "starting veil-authority"
    );

    // --- Authority ---
    // Generating parameters draws the master secret from the OS RNG. It
    // never leaves this struct: not serialized, not logged, not exposed
    // over any endpoint.
    let store = Arc::new(MemoryAccountStore::new());
    let mailer = Arc::new(LogMailer);
    let authority = Arc::new(TrustAuthority::new(store, mailer, &args.issuer));
    tracing::info!("authority parameters generated, master secret held in memory");

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        authority,
    };

    // --- API server ---
    let router = api::create_router(app_state);
    let addr = format!("{}:{}", args.bind_addr, args.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", addr))?;
    tracing::info!("Trust Authority API listening on {}", addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("veil-authority stopped");
    Ok(())
}

/// Generates a throwaway parameter set and prints the public subset as
/// JSON on stdout. The master secret is dropped on return.
fn print_params() -> Result<()> {
    let params = AuthorityParameters::generate(&mut rand::rngs::OsRng);
    let wire = params.public().to_wire();
    let json = serde_json::to_string_pretty(&wire).context("failed to serialize parameters")?;
    println!("{}", json);
    Ok(())
}

fn print_version() {
    println!("veil-authority {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
