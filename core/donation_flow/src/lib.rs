//! # Donation Flow
//!
//! Pure decision logic shared by the donation gateway. Nothing in this crate
//! performs I/O: callers load state, ask this crate what to do, and persist
//! the answer.
//!
//! | Concern              | Entry Point(s)                                            |
//! |----------------------|-----------------------------------------------------------|
//! | Success redirects    | [`compute_success_redirect`]                              |
//! | Failure redirects    | [`compute_failed_redirect`]                               |
//! | Offsite checkout     | [`resolve_offsite_redirect`]                              |
//! | Validation errors    | [`rewrite_checkout_error_redirect`]                       |
//! | Embed views          | [`resolve_view`]                                          |
//! | Query markers        | [`strip_transient_action_markers`], [`markers`]           |
//! | Webhook events       | [`PaymentEvent`], [`plan_transition`]                     |
//! | Refunds              | [`plan_refund`]                                           |
//!
//! ## Architecture
//!
//! Redirect decisions are computed from an explicit [`RedirectContext`] and an
//! optional [`ThemeConfig`]; an absent theme always degrades to window-level
//! navigation. Webhook events are normalised into closed enums before
//! [`plan_transition`] picks at most one action per delivery, so a duplicate
//! delivery evaluated against the already-updated status plans a skip.

use thiserror::Error;

pub mod markers;
mod reconcile;
mod redirect;
mod refund;
mod types;
mod view;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_redirect;

pub use markers::strip_transient_action_markers;
pub use reconcile::{
    plan_transition, PaymentEvent, PaymentStatus, PendingReason, RawPaymentEvent, SkipReason,
    TransactionType, Transition,
};
pub use redirect::{
    compute_failed_redirect, compute_success_redirect, resolve_offsite_redirect,
    rewrite_checkout_error_redirect, RedirectContext, RedirectDecision, RedirectReason,
    RenderMode,
};
pub use refund::{plan_refund, RefundPlan};
pub use types::{DonationStatus, SiteUrls, TemplatePaths, ThemeConfig, View};
pub use view::{resolve_view, FormView};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid donation id: {0}")]
    InvalidDonationId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown donation status: {0}")]
    UnknownStatus(String),

    #[error("completed payment carries no transaction id")]
    MissingTransactionId,
}
