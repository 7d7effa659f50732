//! Applies verified payment notifications to stored donations.
//!
//! Each delivery is planned against the donation's current status and written
//! with a compare-and-set, so concurrent or repeated deliveries of the same
//! event settle to a single transition.

use std::sync::Arc;

use async_trait::async_trait;
use donation_flow::{
    plan_refund, plan_transition, DonationStatus, PaymentEvent, RefundPlan, SkipReason, Transition,
};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{self, Donation, StatusChange};
use crate::errors::{GatewayError, Result};

/// Plan/write rounds before giving up on a donation that keeps changing.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Only part of the donation came back; a note was recorded.
    Partial,
    /// This partial refund was already recorded; nothing was written.
    AlreadyRecorded,
    Settled(DonationStatus),
    /// The donation changed between read and write; nothing was written.
    Superseded,
}

/// Handles refund and reversal notifications for a donation.
#[async_trait]
pub trait RefundProcessor: Send + Sync {
    async fn process_refund(&self, event: &PaymentEvent, donation: &Donation)
        -> Result<RefundOutcome>;
}

pub struct IpnRefundProcessor {
    pool: SqlitePool,
}

impl IpnRefundProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundProcessor for IpnRefundProcessor {
    async fn process_refund(
        &self,
        event: &PaymentEvent,
        donation: &Donation,
    ) -> Result<RefundOutcome> {
        match plan_refund(donation.total, event) {
            RefundPlan::Partial { note, refund_key } => {
                if db::record_partial_refund(&self.pool, donation.id, &refund_key, &note).await? {
                    info!("Partial refund recorded for donation {}", donation.id);
                    Ok(RefundOutcome::Partial)
                } else {
                    debug!(
                        "Partial refund {refund_key} already recorded for donation {}",
                        donation.id
                    );
                    Ok(RefundOutcome::AlreadyRecorded)
                }
            }
            RefundPlan::Full { status, notes } => {
                let change = StatusChange {
                    expected: donation.status,
                    status,
                    transaction_id: None,
                };
                if db::apply_transition(&self.pool, donation.id, change, &notes).await? {
                    info!("Donation {} marked {status}", donation.id);
                    Ok(RefundOutcome::Settled(status))
                } else {
                    Ok(RefundOutcome::Superseded)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Annotated,
    Refund(RefundOutcome),
    Skipped(SkipReason),
    /// No donation carries the event's id. Acknowledged so the processor
    /// stops re-delivering.
    DonationNotFound,
}

pub struct Reconciler {
    pool: SqlitePool,
    refunds: Arc<dyn RefundProcessor>,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, refunds: Arc<dyn RefundProcessor>) -> Self {
        Self { pool, refunds }
    }

    pub async fn process_event(&self, event: &PaymentEvent) -> Result<Outcome> {
        for attempt in 1..=MAX_ATTEMPTS {
            let Some(donation) = db::get_donation(&self.pool, event.donation_id).await? else {
                warn!("IPN for unknown donation {}", event.donation_id);
                return Ok(Outcome::DonationNotFound);
            };

            match plan_transition(donation.status, event) {
                Transition::Skip(reason) => {
                    info!("Donation {} unchanged: {reason:?}", donation.id);
                    return Ok(Outcome::Skipped(reason));
                }
                Transition::AnnotatePending { note } => {
                    db::add_note(&self.pool, donation.id, &note).await?;
                    info!("Donation {} pending: {note}", donation.id);
                    return Ok(Outcome::Annotated);
                }
                Transition::Complete {
                    transaction_id,
                    note,
                } => {
                    let change = StatusChange {
                        expected: donation.status,
                        status: DonationStatus::Publish,
                        transaction_id: Some(&transaction_id),
                    };
                    if db::apply_transition(&self.pool, donation.id, change, &[note]).await? {
                        info!("Donation {} completed ({transaction_id})", donation.id);
                        return Ok(Outcome::Completed);
                    }
                }
                Transition::Refund => match self.refunds.process_refund(event, &donation).await? {
                    RefundOutcome::Superseded => {}
                    outcome => return Ok(Outcome::Refund(outcome)),
                },
            }

            debug!(
                "Donation {} changed during attempt {attempt}; re-planning",
                donation.id
            );
        }

        Err(GatewayError::Contention(event.donation_id))
    }
}
