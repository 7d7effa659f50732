//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use donation_flow::{PaymentEvent, SiteUrls};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::{self, Donation, DonationForm, DonationNote};
use crate::embed;
use crate::errors::{GatewayError, Result};
use crate::ipn::{self, IpnVerifier};
use crate::reconciler::Reconciler;
use crate::themes::ThemeRegistry;

pub struct ApiState {
    pub pool: SqlitePool,
    pub site: SiteUrls,
    pub themes: ThemeRegistry,
    pub verifier: Arc<dyn IpnVerifier>,
    pub reconciler: Reconciler,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/paypal/ipn", post(paypal_ipn))
        .route("/embed/:form_id/redirect", get(embed::redirect))
        .route("/embed/:form_id/view", get(embed::view))
        .route("/donations", post(create_donation))
        .route("/donations/:id", get(get_donation))
        .route("/forms/:id", put(put_form))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Deserialize)]
pub struct CreateDonation {
    pub form_id: i64,
    pub total: Decimal,
}

#[derive(Serialize)]
pub struct DonationResponse {
    #[serde(flatten)]
    pub donation: Donation,
    pub notes: Vec<DonationNote>,
}

#[derive(Deserialize)]
pub struct FormBody {
    pub slug: String,
    #[serde(default)]
    pub theme_id: Option<String>,
}

#[derive(Serialize)]
pub struct FormResponse {
    #[serde(flatten)]
    pub form: DonationForm,
    pub embed_url: String,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /webhooks/paypal/ipn`
///
/// Verifies the notification with PayPal, then reconciles it. Notifications
/// for unknown donations are acknowledged; only unverifiable or malformed
/// bodies and failed writes are refused, so PayPal retries exactly those.
pub async fn paypal_ipn(State(state): State<Arc<ApiState>>, body: Bytes) -> Result<StatusCode> {
    state.verifier.verify(&body).await?;
    let raw = ipn::parse_ipn(&body);
    let txn_type = raw.transaction_type();
    if !txn_type.is_payment_update() {
        info!("IPN of type {txn_type:?} acknowledged without processing");
        return Ok(StatusCode::OK);
    }
    let event = PaymentEvent::try_from(raw)?;
    let outcome = state.reconciler.process_event(&event).await?;
    info!(
        "IPN {:?} for donation {} -> {outcome:?}",
        event.payment_status, event.donation_id
    );
    Ok(StatusCode::OK)
}

/// `POST /donations`
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CreateDonation>,
) -> Result<(StatusCode, Json<Donation>)> {
    if body.total <= Decimal::ZERO {
        return Err(GatewayError::BadRequest(format!(
            "total must be positive, got {}",
            body.total
        )));
    }
    db::get_form(&state.pool, body.form_id)
        .await?
        .ok_or(GatewayError::FormNotFound(body.form_id))?;

    let donation = db::insert_donation(&state.pool, body.form_id, body.total).await?;
    info!("Donation {} created for form {}", donation.id, donation.form_id);
    Ok((StatusCode::CREATED, Json(donation)))
}

/// `GET /donations/:id`
pub async fn get_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<DonationResponse>> {
    let donation = db::get_donation(&state.pool, id)
        .await?
        .ok_or(GatewayError::DonationNotFound(id))?;
    let notes = db::get_notes(&state.pool, id).await?;
    Ok(Json(DonationResponse { donation, notes }))
}

/// `PUT /forms/:id`
///
/// Registers or updates a form. A form without `theme_id` is a legacy form.
pub async fn put_form(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Json(body): Json<FormBody>,
) -> Result<Json<FormResponse>> {
    let slug = body.slug.trim();
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(GatewayError::BadRequest(format!("invalid slug {:?}", body.slug)));
    }
    let theme_id = body.theme_id.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let form = db::upsert_form(&state.pool, id, slug, theme_id).await?;
    let embed_url = state.site.form_route(&form.slug).to_string();
    Ok(Json(FormResponse { form, embed_url }))
}
