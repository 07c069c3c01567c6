use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::dto::{AccountId, AccountUpdate, NewAccount, TransactionId, TransferDirection, TransferRequest};
use crate::ledger::Ledger;

use super::errors::{error_to_response, rejection_to_response};

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default)]
    direction: TransferDirection,
}

pub async fn list_accounts(State(ledger): State<Ledger>) -> Response {
    match ledger.accounts().list_all() {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_account(
    State(ledger): State<Ledger>,
    path: Result<Path<AccountId>, PathRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.accounts().get_by_id(id) {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_account(
    State(ledger): State<Ledger>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Response {
    let Json(new) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.accounts().create(new) {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => error_to_response(err),
    }
}

/// The id in the path overrides any id in the body.
pub async fn update_account(
    State(ledger): State<Ledger>,
    path: Result<Path<AccountId>, PathRejection>,
    body: Result<Json<AccountUpdate>, JsonRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_to_response(rejection),
    };
    let Json(update) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_to_response(rejection),
    };
    let update = AccountUpdate {
        id: Some(id),
        ..update
    };
    match ledger.accounts().update(update).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_account(
    State(ledger): State<Ledger>,
    path: Result<Path<AccountId>, PathRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.accounts().delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn account_transactions(
    State(ledger): State<Ledger>,
    path: Result<Path<AccountId>, PathRejection>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_to_response(rejection),
    };
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.accounts().transactions_for(id, query.direction) {
        Ok(transactions) => (StatusCode::OK, Json(transactions)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn list_transactions(State(ledger): State<Ledger>) -> Response {
    match ledger.transfers().transactions() {
        Ok(transactions) => (StatusCode::OK, Json(transactions)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_transaction(
    State(ledger): State<Ledger>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.transfers().transaction(id) {
        Ok(transaction) => (StatusCode::OK, Json(transaction)).into_response(),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_transaction(
    State(ledger): State<Ledger>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_to_response(rejection),
    };
    match ledger.transfers().execute(request).await {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(err) => error_to_response(err),
    }
}
