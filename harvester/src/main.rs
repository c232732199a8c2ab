// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Harvester Driver
//!
//! Entry point of a generic deployment: wires configuration, logging, the
//! parameter registry, the ETL manager, and the REST surface, then serves
//! until a signal arrives. Source-specific deployments link the library and
//! register their own extractors; this binary ships the JSON directory
//! extractor so a file-drop source works out of the box:
//!
//! ```bash
//! harvester --seed-dir ./records --sink disk
//! harvester --seed-dir ./records --sink http   # submission.url via env
//! ```
//!
//! Exit codes: `0` normal shutdown, `1` unrecoverable initialization error,
//! `2` configuration error.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use harvester_bootstrap::logger::{BootstrapLogger, StderrLogger};
use harvester_bootstrap::shutdown::ShutdownCoordinator;
use harvester_bootstrap::signals::{SystemSignals, UnixSignalHandler};
use harvester_bootstrap::ExitCode;
use harvester_domain::services::IdentityTransformer;
use harvester_domain::value_objects::Parameter;

use harvester::application::services::{EtlManager, EtlPipeline};
use harvester::infrastructure::config::{ParameterRegistry, ServiceConfig};
use harvester::infrastructure::extractors::JsonFileExtractor;
use harvester::infrastructure::loaders::{disk_loader, http_bulk_loader, ReqwestTransport};
use harvester::infrastructure::logging::init_logging;
use harvester::infrastructure::persistence::StateRepository;
use harvester::presentation::{serve, AppState};

/// Which sink the built-in pipelines load into
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Streaming JSON dump under the save directory
    Disk,
    /// Bulk submission to the configured search index
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "harvester", about = "Generic metadata harvester service")]
struct Args {
    /// Path to harvester.toml; defaults to ./harvester.toml when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured listen address
    #[arg(long)]
    listen: Option<String>,

    /// Directory of JSON record files; one pipeline per occurrence
    #[arg(long = "seed-dir")]
    seed_dirs: Vec<PathBuf>,

    /// Sink of the built-in pipelines
    #[arg(long, value_enum, default_value_t = SinkKind::Disk)]
    sink: SinkKind,
}

#[tokio::main]
async fn main() {
    let code = run(Args::parse()).await;
    std::process::exit(code.as_i32());
}

async fn run(args: Args) -> ExitCode {
    // Nothing can log through tracing yet; the bootstrap logger covers the
    // window until the subscriber is installed.
    let boot = StderrLogger::new("harvester");

    let config = match ServiceConfig::load(args.config.as_deref()) {
        Ok(mut config) => {
            if let Some(listen) = args.listen {
                config.listen_address = listen;
            }
            config
        }
        Err(e) => {
            boot.error(&format!("configuration rejected: {}", e));
            return ExitCode::ConfigError;
        }
    };

    boot.info(&format!(
        "module '{}' configured, installing tracing subscriber",
        config.module_name
    ));

    let _log_guard = match init_logging(&config.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            boot.error(&format!("failed to initialize logging: {}", e));
            return ExitCode::InitError;
        }
    };

    info!(module = %config.module_name, "bootstrapping harvester");

    match bootstrap(&config, args.seed_dirs, args.sink).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::from_error(e.as_ref())
        }
    }
}

async fn bootstrap(config: &ServiceConfig, seed_dirs: Vec<PathBuf>, sink: SinkKind) -> anyhow::Result<ExitCode> {
    let coordinator = ShutdownCoordinator::default();
    let registry = Arc::new(ParameterRegistry::new());

    let repository = StateRepository::new(&config.cache_dir, &config.module_name);
    let mut manager = EtlManager::new(
        config.module_name.clone(),
        repository,
        &registry,
        coordinator.token(),
    )?;

    // Standard loader parameters; the environment overlay may override all
    // of them at startup, the REST surface at runtime.
    let save_dir = registry.register(Parameter::text(
        "save",
        "directory",
        config.save_dir.to_string_lossy(),
    )?);
    let submission_url = registry.register(Parameter::url("submission", "url")?);
    let submission_user = registry.register(Parameter::text("submission", "userName", "")?);
    let submission_password = registry.register(Parameter::password("submission", "password", "")?);
    let submission_timeout = registry.register(Parameter::int("submission", "timeout", 30)?);
    let batch_size = registry.register(Parameter::non_negative_int("submission", "batchSize", 1_048_576)?);

    for dir in seed_dirs {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("records")
            .to_string();

        let extractor = Box::new(JsonFileExtractor::new(&dir));
        let pipeline = match sink {
            SinkKind::Disk => EtlPipeline::new(
                &name,
                extractor,
                Box::new(IdentityTransformer),
                Box::new(disk_loader(save_dir.clone(), batch_size.clone())),
            ),
            SinkKind::Http => EtlPipeline::new(
                &name,
                extractor,
                Box::new(IdentityTransformer),
                Box::new(http_bulk_loader(
                    submission_url.clone(),
                    submission_user.clone(),
                    submission_password.clone(),
                    submission_timeout.clone(),
                    batch_size.clone(),
                    Box::new(ReqwestTransport::new()?),
                )),
            ),
        };
        manager.register(pipeline)?;
    }

    registry.overlay_from_environment();

    let manager = Arc::new(manager);
    manager.init().await.context("pipeline initialization failed")?;

    // Signals initiate the same graceful shutdown an operator would.
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        let handler = UnixSignalHandler::new();
        handler
            .wait_for_signal(Box::new(move || signal_coordinator.initiate_shutdown()))
            .await;
    });

    let state = AppState {
        manager: manager.clone(),
        registry: registry.clone(),
        log_dir: config.log_dir.clone(),
    };

    serve(&config.listen_address, state, coordinator.token())
        .await
        .context("REST surface failed")?;

    // Drain: abort any in-flight run, wait for it to settle, persist.
    info!("shutting down");
    let _ = manager.abort_harvest();
    let _ = manager.join_harvest().await;
    if let Err(e) = manager.save_to_disk().await {
        error!(error = %e, "failed to persist state during shutdown");
    }
    coordinator.complete_shutdown();

    Ok(ExitCode::Success)
}
