use std::{process, sync::Arc};

use bookshelf::{
    application::{
        books::BookService,
        error::AppError,
        repos::{BooksRepo, BooksWriteRepo, ReviewsWriteRepo},
        writes::CatalogWriter,
    },
    cache::{CacheConfig, InvalidationHook, MemoryStore, ReadThroughCache, WriteObservers},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
    util::clock::{Clock, SystemClock},
};
use tokio::sync::Notify;
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
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    serve_http(&settings, state).await
}

/// Storage handles, each repository trait resolved to the same backend.
struct Repositories {
    books: Arc<dyn BooksRepo>,
    books_write: Arc<dyn BooksWriteRepo>,
    reviews_write: Arc<dyn ReviewsWriteRepo>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "bookshelf::startup",
            "database url is not configured; using in-memory repositories"
        );
        let memory = Arc::new(InMemoryRepositories::new());
        return Ok(Repositories {
            books: memory.clone(),
            books_write: memory.clone(),
            reviews_write: memory,
        });
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let postgres = Arc::new(PostgresRepositories::new(pool));
    postgres
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Repositories {
        books: postgres.clone(),
        books_write: postgres.clone(),
        reviews_write: postgres,
    })
}

fn build_http_state(repositories: Repositories, settings: &config::Settings) -> HttpState {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache_config = CacheConfig::from(&settings.cache);

    let store = Arc::new(MemoryStore::new(&cache_config, clock.clone()));
    let cache = ReadThroughCache::new(store, cache_config.clone());
    let observers = WriteObservers::new().with(Arc::new(InvalidationHook::new(cache.clone())));

    info!(
        target = "bookshelf::startup",
        cache_enabled = cache_config.enabled,
        cache_ttl_seconds = cache_config.ttl_seconds,
        cache_capacity = cache_config.capacity,
        "Read-through cache configured"
    );

    let books = Arc::new(BookService::new(
        repositories.books,
        cache,
        clock.clone(),
    ));
    let writer = Arc::new(CatalogWriter::new(
        repositories.books_write,
        repositories.reviews_write,
        observers,
        clock,
    ));

    HttpState { books, writer }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "bookshelf::startup",
        addr = %settings.server.addr,
        "HTTP listener bound"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        _ = shutdown_signal() => {}
    }

    info!(
        target = "bookshelf::startup",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "bookshelf::startup",
                "graceful shutdown timed out; abandoning open connections"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "bookshelf::startup",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
