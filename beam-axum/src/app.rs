use std::future::Future;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use beam_core::BeamEngine;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::multipart::MultipartConfig;
use crate::rest;
use crate::BeamAxumState;

/// The Beam HTTP application: API routes, middleware and optional static assets.
#[derive(Clone)]
pub struct BeamApp {
    pub state: BeamAxumState,
    static_dir: Option<PathBuf>,
}

impl BeamApp {
    pub fn new(engine: BeamEngine, multipart: MultipartConfig) -> Self {
        Self {
            state: BeamAxumState::new(engine, multipart),
            static_dir: None,
        }
    }

    /// Serve files from `dir` for any path no API route matches.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn router(&self) -> Router<()> {
        let mut router = rest::api_router(self.state.clone());
        if let Some(dir) = &self.static_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }

        // Multipart framing adds a little on top of the file itself.
        let body_limit = self
            .state
            .multipart
            .max_file_size
            .saturating_add(64 * 1024);

        router
            .layer(RequestBodyLimitLayer::new(
                usize::try_from(body_limit).unwrap_or(usize::MAX),
            ))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn listen<A, F>(self, addr: A, shutdown: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "beam listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

pub fn beam(engine: BeamEngine, multipart: MultipartConfig) -> BeamApp {
    BeamApp::new(engine, multipart)
}
