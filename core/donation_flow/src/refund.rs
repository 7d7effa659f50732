//! Refund and reversal handling for an already-dispatched refund event.

use rust_decimal::Decimal;

use crate::reconcile::{PaymentEvent, PaymentStatus};
use crate::types::DonationStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundPlan {
    /// Less than the donation total came back; only a note is recorded,
    /// once per `refund_key`.
    Partial { note: String, refund_key: String },
    Full {
        status: DonationStatus,
        notes: Vec<String>,
    },
}

/// Decide between a partial and a full refund.
///
/// Only an explicit gross below the donation total is partial; a refund
/// without an amount settles the donation.
pub fn plan_refund(donation_total: Decimal, event: &PaymentEvent) -> RefundPlan {
    let parent = event.parent_txn_id.as_deref().unwrap_or("unknown");

    if event.gross.is_some_and(|g| g.abs() < donation_total) {
        let note = format!("Partial PayPal refund processed: {parent}");
        // Redeliveries repeat the refund's own txn_id.
        let refund_key = event.txn_id.clone().unwrap_or_else(|| note.clone());
        return RefundPlan::Partial { note, refund_key };
    }

    let reason = event.reason_code.as_deref().unwrap_or("unknown");
    let (status, verb) = match event.payment_status {
        PaymentStatus::Reversed => (DonationStatus::Reversed, "Reversed"),
        _ => (DonationStatus::Refunded, "Refunded"),
    };

    let mut notes = vec![format!(
        "PayPal Payment #{parent} {verb} for reason: {reason}"
    )];
    if let Some(txn_id) = &event.txn_id {
        notes.push(format!("PayPal Refund Transaction ID: {txn_id}"));
    }

    RefundPlan::Full { status, notes }
}
