//! Embedded-form redirect and view endpoints.
//!
//! Each request runs the same stages in order:
//!
//! ```text
//! resolve_form ──► resolve_theme ──► compute_redirect / resolve_view ──► emit_response
//! ```
//!
//! Iframe decisions answer `302 Found`. Window decisions answer a bridge page
//! that moves the top-level window, since a redirect issued inside an iframe
//! can only navigate the iframe itself.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{
        header::{CACHE_CONTROL, EXPIRES, LOCATION},
        HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Json,
};
use donation_flow::markers::remove_query_args;
use donation_flow::{
    compute_failed_redirect, compute_success_redirect, resolve_offsite_redirect, resolve_view,
    rewrite_checkout_error_redirect, strip_transient_action_markers, FormView, RedirectContext,
    RedirectDecision, RedirectReason, RenderMode, ThemeConfig,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use url::Url;

use crate::api::ApiState;
use crate::db::{self, DonationForm};
use crate::errors::{GatewayError, Result};
use crate::themes::{ThemeRegistry, ThemeResolution};

const NO_CACHE: &str = "no-cache, must-revalidate, max-age=0, no-store, private";
const EXPIRED: &str = "Wed, 11 Jan 1984 05:00:00 GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectOutcome {
    Success,
    Failed,
    /// Any redirect issued while the donation is processed, including the
    /// return leg of an offsite checkout.
    Offsite,
    /// Validation failed; send the donor back to the form.
    CheckoutError,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub outcome: RedirectOutcome,
    pub location: String,
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub form_id: i64,
    /// Request address with one-shot markers removed, for `history.replaceState`.
    pub clean_url: String,
    #[serde(flatten)]
    pub view: FormView,
}

// ─────────────────────────────────────────────────────────
// Pipeline stages
// ─────────────────────────────────────────────────────────

async fn resolve_form(pool: &SqlitePool, form_id: i64) -> Result<DonationForm> {
    db::get_form(pool, form_id)
        .await?
        .ok_or(GatewayError::FormNotFound(form_id))
}

fn resolve_theme<'a>(themes: &'a ThemeRegistry, form: &DonationForm) -> ThemeResolution<'a> {
    themes.resolve(form.theme_id.as_deref())
}

/// Address of the embed page this request stands for: the form's route
/// carrying the request's query markers.
fn request_address(form_route: &Url, raw_query: Option<&str>) -> Url {
    let mut url = form_route.clone();
    url.set_query(raw_query.filter(|q| !q.is_empty()));
    remove_query_args(&url, &["outcome", "location"])
}

fn compute_redirect(
    query: &RedirectQuery,
    theme: Option<&ThemeConfig>,
    form_id: i64,
    ctx: &RedirectContext<'_>,
) -> Result<RedirectDecision> {
    let location = || {
        ctx.site
            .home
            .join(query.location.trim())
            .map_err(|e| GatewayError::BadRequest(format!("invalid location: {e}")))
    };

    Ok(match query.outcome {
        RedirectOutcome::Success => compute_success_redirect(&location()?, theme, ctx),
        RedirectOutcome::Failed => compute_failed_redirect(&location()?, theme, form_id, ctx),
        RedirectOutcome::Offsite => resolve_offsite_redirect(&location()?, theme, ctx),
        RedirectOutcome::CheckoutError => RedirectDecision::iframe(
            rewrite_checkout_error_redirect(&query.location, &ctx.form_route),
            RedirectReason::Passthrough,
        ),
    })
}

fn emit_response(decision: &RedirectDecision) -> Result<Response> {
    let response = match decision.render_mode {
        RenderMode::Iframe => {
            (StatusCode::FOUND, [(LOCATION, decision.destination.to_string())]).into_response()
        }
        RenderMode::Window => {
            (StatusCode::OK, Html(bridge_page(&decision.destination)?)).into_response()
        }
    };
    Ok(no_cache(response))
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /embed/:form_id/redirect`
pub async fn redirect(
    State(state): State<Arc<ApiState>>,
    Path(form_id): Path<i64>,
    Query(query): Query<RedirectQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response> {
    let form = resolve_form(&state.pool, form_id).await?;
    let resolution = resolve_theme(&state.themes, &form);

    let form_route = state.site.form_route(&form.slug);
    let request_url = request_address(&form_route, raw_query.as_deref());
    let ctx = RedirectContext::from_request(&state.site, request_url, form_route);

    let decision = compute_redirect(&query, resolution.theme(), form.id, &ctx)?;
    info!(
        "Form {} {:?} redirect -> {} in {} ({:?})",
        form.id,
        query.outcome,
        decision.destination,
        decision.render_mode.as_str(),
        decision.reason
    );
    emit_response(&decision)
}

/// `GET /embed/:form_id/view`
pub async fn view(
    State(state): State<Arc<ApiState>>,
    Path(form_id): Path<i64>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response> {
    let form = resolve_form(&state.pool, form_id).await?;
    let resolution = resolve_theme(&state.themes, &form);

    let form_route = state.site.form_route(&form.slug);
    let request_url = request_address(&form_route, raw_query.as_deref());
    let clean_url = strip_transient_action_markers(&request_url).to_string();
    let ctx = RedirectContext::from_request(&state.site, request_url, form_route);

    let view = resolve_view(&ctx, resolution.theme());
    let cacheable = view.is_cacheable();
    let response = Json(ViewResponse {
        form_id: form.id,
        clean_url,
        view,
    })
    .into_response();

    Ok(if cacheable {
        response
    } else {
        no_cache(response)
    })
}

// ─────────────────────────────────────────────────────────
// Response helpers
// ─────────────────────────────────────────────────────────

fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(EXPIRES, HeaderValue::from_static(EXPIRED));
    response
}

fn bridge_page(target: &Url) -> Result<String> {
    // `</` would let the target close the script element.
    let script_target = serde_json::to_string(target.as_str())?.replace("</", "<\\/");
    Ok(format!(
        "<!DOCTYPE html>\n\
         <html><head><meta charset=\"utf-8\"><title>Redirecting</title></head>\n\
         <body><script>window.top.location.href = {script_target};</script>\n\
         <noscript><a href=\"{href}\" target=\"_top\">Continue</a></noscript></body></html>\n",
        href = escape_html(target.as_str()),
    ))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
