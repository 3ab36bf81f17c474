//! Request handlers and wire DTOs for the commission API.
//!
//! Handlers stay thin: parse the request into domain inputs, call one
//! application service, render the result. Authorization and invariants
//! live behind those calls, so nothing here checks roles beyond what the
//! services demand through their signatures.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::application::aggregation::{AggregationService, DashboardRow};
use crate::application::engine::{HistoryFilter, InitiateRequest, PayoutEngine};
use crate::application::wallet::{WalletService, WalletSnapshot};
use crate::domain::actor::Actor;
use crate::domain::ids::{Country, DriverId, ManagerId, PayoutId};
use crate::domain::money::Money;
use crate::domain::order::PayPeriod;
use crate::domain::payout::{ActionStamp, CommissionPayout, PayoutStatus};
use crate::domain::ports::PayoutNotifierArc;
use crate::error::{CommissionError, Result};

/// Shared state behind every handler.
pub struct AppState {
    pub engine: Arc<PayoutEngine>,
    pub aggregation: Arc<AggregationService>,
    pub wallets: Arc<WalletService>,
    pub notifier: PayoutNotifierArc,
}

/// Dashboard window, dates inclusive on both ends.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardQuery {
    pub country: Option<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Body of `POST /commission/initiate`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateBody {
    pub driver_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub payment_method: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl InitiateBody {
    fn into_request(self) -> Result<InitiateRequest> {
        Ok(InitiateRequest {
            driver_id: DriverId::new(self.driver_id),
            period: PayPeriod::from_dates(self.from, self.to)?,
            payment_method: self.payment_method,
            note: self.note,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproveBody {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaidBody {
    pub payment_reference: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub driver_id: Option<String>,
    pub status: Option<PayoutStatus>,
}

/// Payout as shown to API consumers. Mirrors the record minus the bound
/// order ids (the receipt itemizes those) and the receipt's storage path.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutResponse {
    pub id: PayoutId,
    pub driver_id: DriverId,
    pub manager_id: ManagerId,
    pub status: PayoutStatus,
    pub period: PayPeriod,
    pub total_orders: u64,
    pub total_earnings: Money,
    pub commission_rate: Money,
    pub commission_amount: Money,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub initiated: ActionStamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<ActionStamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<ActionStamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<ActionStamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<ActionStamp>,
    pub receipt_ready: bool,
}

impl From<&CommissionPayout> for PayoutResponse {
    fn from(payout: &CommissionPayout) -> Self {
        Self {
            id: payout.id,
            driver_id: payout.driver_id.clone(),
            manager_id: payout.manager_id.clone(),
            status: payout.status,
            period: payout.period,
            total_orders: payout.total_orders,
            total_earnings: payout.total_earnings.clone(),
            commission_rate: payout.commission_rate.clone(),
            commission_amount: payout.commission_amount.clone(),
            payment_method: payout.payment_method.clone(),
            payment_note: payout.payment_note.clone(),
            payment_reference: payout.payment_reference.clone(),
            driver_note: payout.driver_note.clone(),
            rejection_reason: payout.rejection_reason.clone(),
            initiated: payout.initiated.clone(),
            approved: payout.approved.clone(),
            paid: payout.paid.clone(),
            rejected: payout.rejected.clone(),
            cancelled: payout.cancelled.clone(),
            receipt_ready: payout.receipt_path.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<DashboardRow>>, CommissionError> {
    let period = PayPeriod::from_dates(query.from, query.to)?;
    let country = query.country.map(Country::new);
    let rows = state.aggregation.dashboard(country.as_ref(), period).await?;
    Ok(Json(rows))
}

#[instrument(skip(state, body))]
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<InitiateBody>,
) -> Result<(StatusCode, Json<PayoutResponse>), CommissionError> {
    let payout = state.engine.initiate(&actor, body.into_request()?).await?;
    Ok((StatusCode::CREATED, Json(PayoutResponse::from(&payout))))
}

#[instrument(skip(state, body))]
pub async fn approve(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<PayoutResponse>, CommissionError> {
    let payout = state.engine.approve(&actor, id.into(), body.note).await?;
    Ok(Json(PayoutResponse::from(&payout)))
}

#[instrument(skip(state, body))]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<Json<PayoutResponse>, CommissionError> {
    let payout = state.engine.reject(&actor, id.into(), body.reason).await?;
    Ok(Json(PayoutResponse::from(&payout)))
}

#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PayoutResponse>, CommissionError> {
    let payout = state.engine.cancel(&actor, id.into()).await?;
    Ok(Json(PayoutResponse::from(&payout)))
}

#[instrument(skip(state, body))]
pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PaidBody>,
) -> Result<Json<PayoutResponse>, CommissionError> {
    let payout = state
        .engine
        .mark_paid(&actor, id.into(), body.payment_reference)
        .await?;
    Ok(Json(PayoutResponse::from(&payout)))
}

#[instrument(skip(state))]
pub async fn my_payouts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<PayoutResponse>>, CommissionError> {
    let payouts = state.engine.my_payouts(&actor).await?;
    Ok(Json(payouts.iter().map(PayoutResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PayoutResponse>>, CommissionError> {
    let filter = HistoryFilter {
        driver_id: query.driver_id.map(DriverId::new),
        status: query.status,
    };
    let payouts = state.engine.history(&actor, filter).await?;
    Ok(Json(payouts.iter().map(PayoutResponse::from).collect()))
}

/// Serves the stored receipt document itself, not a link to it.
#[instrument(skip(state))]
pub async fn receipt(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, CommissionError> {
    let path = state.engine.receipt_path(&actor, id.into()).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| CommissionError::Store(format!("receipt file {path}: {e}")))?;
    let document = serde_json::from_slice(&bytes)
        .map_err(|e| CommissionError::Store(format!("receipt file {path}: {e}")))?;
    Ok(Json(document))
}

#[instrument(skip(state))]
pub async fn wallet(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Result<Json<WalletSnapshot>, CommissionError> {
    let snapshot = state.wallets.wallet(&DriverId::new(driver_id)).await?;
    Ok(Json(snapshot))
}
