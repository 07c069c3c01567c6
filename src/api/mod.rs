//! HTTP surface of the ledger.
//!
//! Handlers are thin: they decode the body, call the [`Ledger`] and map the
//! outcome to a status code. Every error kind maps to one status category, see
//! [`errors::status_for`]. Error bodies name the failing request's path and
//! method.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::ledger::Ledger;

pub mod errors;
mod routes;

pub const BASE_PATH: &str = "/api/v1/fts";

pub fn router(ledger: Ledger) -> Router {
    let api = Router::new()
        .route("/accounts", get(routes::list_accounts))
        .route("/account", post(routes::create_account))
        .route(
            "/account/:id",
            get(routes::get_account)
                .put(routes::update_account)
                .delete(routes::delete_account),
        )
        .route("/account/:id/transactions", get(routes::account_transactions))
        .route("/transactions", get(routes::list_transactions))
        .route("/transaction", post(routes::create_transaction))
        .route("/transaction/:id", get(routes::get_transaction));

    Router::new()
        .nest(BASE_PATH, api)
        .layer(middleware::from_fn(errors::describe_request))
        .with_state(ledger)
}

/// Serves the API on `config.bind_addr` until the process is stopped.
pub async fn serve(ledger: Ledger, config: &Config) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(ledger)).await
}
