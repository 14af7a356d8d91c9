#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    reason = "not yet ready for that"
)]

pub mod error;
pub mod report;
pub mod routes;
pub mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use department_selection_config::Config;
use department_selection_database::{
    create_schema, get_database_connection, MemoryRepository, PgRepository, Repository,
};
use department_selection_engine::GlobalLimit;
use error::AppError;
use futures_util::{pin_mut, Future};
use headers::{Header, HeaderMapExt as _};
use http::{Request, Response};
use http_body::Body;
use http_body_util::{BodyExt as _, Full, Limited};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Request bodies are small JSON documents.
const MAX_BODY_SIZE: usize = 1024 * 1024;

pub trait ResponseTypedHeaderExt {
    #[must_use]
    fn typed_header<H: Header>(self, header: H) -> Self;
}

impl ResponseTypedHeaderExt for http::response::Builder {
    fn typed_header<H: Header>(mut self, header: H) -> Self {
        if let Some(headers) = self.headers_mut() {
            headers.typed_insert(header);
        }
        self
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, config: Config) -> Self {
        Self {
            repository,
            config: Arc::new(config),
        }
    }

    /// Picks Postgres when a database url is configured, memory otherwise.
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let fallback = GlobalLimit::from(config.default_max_departments);
        let repository: Arc<dyn Repository> = match &config.database_url {
            Some(database_url) => {
                let pool = get_database_connection(database_url)?;
                create_schema(&pool).await?;
                info!("using postgres repository");
                Arc::new(PgRepository::new(pool, fallback))
            }
            None => {
                warn!("no database_url configured, keeping everything in memory");
                Arc::new(MemoryRepository::new(fallback))
            }
        };
        if config.seed_on_startup && repository.seed().await? {
            info!("seeded default departments");
        }
        Ok(Self::new(repository, config))
    }
}

/// Answers one request. Failures become JSON error responses here.
pub async fn handle<B>(request: Request<B>, state: AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    debug!(method = %request.method(), uri = %request.uri(), "request");
    let (parts, body) = request.into_parts();
    let body = match Limited::new(body, MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return AppError::Body(err).into_response(),
    };
    match routes::route(Request::from_parts(parts, body), &state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Binds the listener and returns the accept loop, which runs until Ctrl+C or
/// SIGTERM and then waits for open connections to finish.
pub async fn run_server(
    listen_address: SocketAddr,
    state: AppState,
) -> Result<impl Future<Output = Result<(), AppError>>, AppError> {
    let listener = TcpListener::bind(listen_address).await?;
    info!(%listen_address, "started up server...");
    Ok(serve(listener, state, shutdown_signal()))
}

/// The accept loop behind [`run_server`], stopping once `shutdown` completes.
#[allow(clippy::cognitive_complexity)]
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AppError> {
    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    pin_mut!(shutdown);

    #[allow(clippy::redundant_pub_crate)]
    loop {
        select! {
            accept = listener.accept() => {
                let (socket, remote_addr) = match accept {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        error!("failed to accept connection: {err}");
                        continue;
                    }
                };
                debug!(%remote_addr, "accepted connection");

                let state = state.clone();
                let shutdown_tx = Arc::clone(&shutdown_tx);
                let closed_rx = closed_rx.clone();

                tokio::spawn(async move {
                    let socket = TokioIo::new(socket);

                    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, core::convert::Infallible>(handle(request, state).await) }
                    });

                    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                    let connection = builder.serve_connection(socket, hyper_service);
                    pin_mut!(connection);

                    loop {
                        select! {
                            connection_result = connection.as_mut() => {
                                if let Err(err) = connection_result {
                                    error!("failed to serve connection: {err:#}");
                                }
                                break;
                            }
                            () = shutdown_tx.closed() => {
                                connection.as_mut().graceful_shutdown();
                            }
                        }
                    }

                    drop(closed_rx);
                });
            }
            () = &mut shutdown => {
                warn!("shutting down, waiting for open connections");
                drop(shutdown_rx); // initiate shutdown
                drop(closed_rx);
                closed_tx.closed().await;
                break;
            }
        }
    }

    info!("server stopped");
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
