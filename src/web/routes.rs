use super::AppState;
use crate::core::dates::{format_date, parse_date};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

type JsonResponse = (StatusCode, Json<Value>);

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/funds", get(fund_rates))
        .route("/api/funds/available", get(available_funds))
        .route("/api/health", get(health_check))
}

#[derive(Debug, Deserialize)]
pub struct FundsQuery {
    date: Option<String>,
}

/// `GET /api/funds?date=YYYY-MM-DD`, defaulting to today.
async fn fund_rates(State(state): State<AppState>, Query(query): Query<FundsQuery>) -> JsonResponse {
    let raw_date = query
        .date
        .unwrap_or_else(|| format_date(Local::now().date_naive()));
    let Ok(date) = parse_date(&raw_date) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid date format. Use YYYY-MM-DD",
                "example": "2024-10-18"
            })),
        );
    };

    match state.source.fetch_day_data(date).await {
        Some(payload) => (StatusCode::OK, Json(payload.0)),
        None => {
            error!(%date, "Failed to fetch fund data");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to fetch fund data",
                    "date": format_date(date)
                })),
            )
        }
    }
}

/// `GET /api/funds/available`
async fn available_funds(State(state): State<AppState>) -> JsonResponse {
    let funds = state
        .source
        .discover_fund_names(Local::now().date_naive())
        .await;
    (
        StatusCode::OK,
        Json(json!({
            "count": funds.len(),
            "funds": funds,
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
}

/// `GET /api/health`: reports whether the upstream endpoint answers today.
async fn health_check(State(state): State<AppState>) -> JsonResponse {
    let reachable = state
        .source
        .fetch_day_data(Local::now().date_naive())
        .await
        .is_some();
    let timestamp = Utc::now().to_rfc3339();

    if reachable {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "api_accessible": true,
                "timestamp": timestamp
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "api_accessible": false,
                "error": "Rates endpoint unreachable",
                "timestamp": timestamp
            })),
        )
    }
}

pub async fn not_found() -> JsonResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "message": "The requested API endpoint does not exist"
        })),
    )
}
