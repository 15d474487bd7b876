use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;

use tempo::api;
use tempo::config::{Config, ContentStoreKind, DEFAULT_ADMIN_PASSWORD, DeletionMode, S3Settings};
use tempo::service::shutdown::ShutdownCoordinator;
use tempo::storage::driver;
use tempo::utils::cli::Args;
use tempo::utils::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_file.as_deref().map(Path::new))?;
    let config = validate_config(&args).await;

    let backend = driver::connect(&config)
        .await
        .context("failed to initialize content store")?;
    let state = AppState::new(config.clone(), backend)
        .await
        .context("failed to prepare upload directory")?;
    let coordinator =
        ShutdownCoordinator::new(state.shutdown.clone(), state.tasks.clone(), &config);

    let scheduler = state.eviction_scheduler()?.spawn(coordinator.token());

    let app = api::create_router(Arc::new(state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let http_token = coordinator.http_token();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(http_token.cancelled_owned())
            .await
    });

    let report = coordinator.run(shutdown_signal(), scheduler, server).await;
    tracing::info!(?report, "Server exiting");
    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn validate_config(args: &Args) -> Config {
    let mut validation_errors = Vec::new();

    let upload_dir = PathBuf::from(&args.upload_dir);
    if let Ok(meta) = tokio::fs::metadata(&upload_dir).await {
        if !meta.is_dir() {
            validation_errors.push(format!(
                "TEMPO_UPLOAD_DIR `{}` exists but is not a directory",
                args.upload_dir,
            ));
        }
    }

    let content_store = args.content_store.parse::<ContentStoreKind>().unwrap_or_else(|err| {
        validation_errors.push(format!("TEMPO_CONTENT_STORE: {err}"));
        Default::default()
    });
    let deletion_mode = args.deletion_mode.parse::<DeletionMode>().unwrap_or_else(|err| {
        validation_errors.push(format!("TEMPO_DELETION_MODE: {err}"));
        Default::default()
    });

    let content_root = PathBuf::from(&args.content_root);
    if content_root == upload_dir {
        validation_errors.push(format!(
            "TEMPO_CONTENT_ROOT `{}` must differ from TEMPO_UPLOAD_DIR",
            args.content_root,
        ));
    }

    if args.eviction_interval_secs == 0 {
        validation_errors.push("TEMPO_EVICTION_INTERVAL_SECS must be positive".to_string());
    }

    let admin_password = std::env::var("ADMPASSWORD")
        .ok()
        .filter(|password| !password.is_empty())
        .unwrap_or_else(|| {
            tracing::warn!(
                "ADMPASSWORD is not set. Use default value: `{}`",
                DEFAULT_ADMIN_PASSWORD
            );
            DEFAULT_ADMIN_PASSWORD.into()
        });

    if !validation_errors.is_empty() {
        eprintln!("{}", validation_errors.join("\n"));
        std::process::exit(1);
    }

    let shutdown_timeout = Duration::from_secs(args.shutdown_timeout_secs);
    Config {
        host: args.host.clone(),
        port: args.port,
        upload_dir,
        content_store,
        content_root,
        s3: S3Settings {
            bucket: args.s3_bucket.clone(),
            endpoint: args.s3_endpoint.clone(),
            region: args.s3_region.clone(),
        },
        deletion_mode,
        admin_password,
        eviction_interval: Duration::from_secs(args.eviction_interval_secs),
        store_timeout: Duration::from_secs(args.store_timeout_secs),
        delete_timeout: Duration::from_secs(args.delete_timeout_secs),
        download_cleanup_delay: Duration::from_secs(args.download_cleanup_secs),
        shutdown_timeout,
        shutdown_warning: shutdown_timeout * 7 / 10,
        eviction_grace: Duration::from_secs(args.eviction_grace_secs),
        max_eviction_attempts: (args.max_eviction_attempts > 0)
            .then_some(args.max_eviction_attempts),
        max_upload_bytes: args.max_upload_bytes,
        log_file: args.log_file.as_ref().map(PathBuf::from),
    }
}
