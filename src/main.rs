use std::{process, sync::Arc, time::Duration};

use corkboard::{
    application::{
        admin::AdminService,
        error::{AppError, ErrorReport},
        listings::ListingService,
    },
    cache::{CacheConfig, CacheTrigger, TagCache, spawn_sweeper},
    config,
    infra::{
        error::InfraError,
        http::{self, AdminState, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use axum::http::StatusCode;
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = ErrorReport::from_error("main", StatusCode::INTERNAL_SERVER_ERROR, error).messages;
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) =
        config::load_with_cli().map_err(|err| AppError::from(InfraError::from(err)))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

struct ApplicationContext {
    cache: Arc<TagCache>,
    http_state: HttpState,
    admin_state: AdminState,
}

fn build_application_context(
    repositories: MemoryRepositories,
    settings: &config::Settings,
) -> ApplicationContext {
    let repos = Arc::new(repositories);
    let cache = Arc::new(TagCache::new(CacheConfig::from(&settings.cache)));
    let trigger = CacheTrigger::new(cache.clone());

    let listings = Arc::new(ListingService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        cache.clone(),
        settings.revalidate,
    ));
    let admin = Arc::new(AdminService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos,
        trigger,
    ));

    ApplicationContext {
        http_state: HttpState {
            listings: listings.clone(),
        },
        admin_state: AdminState {
            admin,
            listings,
            cache: cache.clone(),
        },
        cache,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(MemoryRepositories::new(), &settings);

    let sweeper = app
        .cache
        .config()
        .sweep_every()
        .map(|every| spawn_sweeper(app.cache.clone(), every));

    let result = serve_http(&settings, app.http_state, app.admin_state).await;

    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::bind("public", settings.server.public_addr))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(InfraError::bind("admin", settings.server.admin_addr))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx));

    let servers = async { try_join!(public_server, admin_server).map(|_| ()) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            return result.map_err(|err| InfraError::Serve(err).into());
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    }

    drain(settings.server.graceful_shutdown, servers).await
}

async fn drain<F>(timeout: Duration, servers: F) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match tokio::time::timeout(timeout, servers).await {
        Ok(result) => result.map_err(|err| InfraError::Serve(err).into()),
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|requested| *requested).await;
}
