//! HTTP server for the rewrite gateway
//!
//! Wires the verifier, the rewriting engine and the store health check into
//! an actix-web application.

use crate::auth::RequestVerifier;
use crate::rewrite::Rewriter;
use crate::store::HealthCheck;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::http::Method;
use actix_web::{middleware, web, App, HttpServer};
use common::{
    Result, HEADER_DEVICE_ID, HEADER_DEVICE_SECRET, HEADER_NONCE, HEADER_SIGNATURE,
    HEADER_TIMESTAMP,
};
use log::info;
use std::sync::Arc;

pub mod handlers;

/// Shared state handed to every request handler.
pub struct AppState {
    pub verifier: RequestVerifier,
    pub rewriter: Arc<dyn Rewriter>,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    pub fn new(
        verifier: RequestVerifier,
        rewriter: Arc<dyn Rewriter>,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        Self { verifier, rewriter, health }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/rewrite")
                    .route(web::post().to(handlers::rewrite))
                    .route(web::method(Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(web::resource("/status").route(web::get().to(handlers::get_status))),
    );
}

/// Any origin may call the API; only POST and the auth headers are allowed.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(vec!["POST", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE.as_str(),
            HEADER_DEVICE_ID,
            HEADER_TIMESTAMP,
            HEADER_NONCE,
            HEADER_SIGNATURE,
            HEADER_DEVICE_SECRET,
        ])
        .max_age(3600)
}

pub struct GatewayServer {
    state: web::Data<AppState>,
    bind_address: String,
}

impl GatewayServer {
    pub fn new(state: AppState, bind_address: impl Into<String>) -> Self {
        Self {
            state: web::Data::new(state),
            bind_address: bind_address.into(),
        }
    }

    /// Serves until the HTTP server stops (e.g. on Ctrl-C).
    pub async fn start(&self) -> Result<()> {
        let state = self.state.clone();

        info!("Starting HTTP server on {}", self.bind_address);
        let http_server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(configure)
                .wrap(cors())
                .wrap(middleware::Logger::default())
        })
        .bind(self.bind_address.as_str())?;

        http_server.run().await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
