//! Payment-status notifications and the transition each one implies.
//!
//! The processor's fields arrive as free text; [`RawPaymentEvent`] holds them
//! untouched and [`PaymentEvent`] is the validated, normalised form that
//! [`plan_transition`] dispatches on.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::DonationStatus;
use crate::FlowError;

/// IPN transaction types. Only single payments and carts update donations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionType {
    WebAccept,
    Cart,
    Other(String),
}

impl TransactionType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "web_accept" => Self::WebAccept,
            "cart" => Self::Cart,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_payment_update(&self) -> bool {
        matches!(self, Self::WebAccept | Self::Cart)
    }
}

/// Normalised `payment_status`. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Refunded,
    Reversed,
    Unrecognized(String),
}

impl PaymentStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            "refunded" => Self::Refunded,
            "reversed" => Self::Reversed,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, Self::Refunded | Self::Reversed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReason {
    Echeck,
    Address,
    Intl,
    MultiCurrency,
    PaymentReview,
    RegulatoryReview,
    Unilateral,
    Upgrade,
    Verify,
    Other,
    Unknown(String),
}

impl PendingReason {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "echeck" => Self::Echeck,
            "address" => Self::Address,
            "intl" => Self::Intl,
            "multi-currency" | "multi_currency" => Self::MultiCurrency,
            "paymentreview" => Self::PaymentReview,
            "regulatory_review" => Self::RegulatoryReview,
            "unilateral" => Self::Unilateral,
            "upgrade" => Self::Upgrade,
            "verify" => Self::Verify,
            "other" => Self::Other,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Audit note recorded against the donation.
    pub fn note(&self) -> String {
        match self {
            Self::Echeck => {
                "Payment made via eCheck and will clear automatically in 5-8 days.".to_string()
            }
            Self::Address => "Payment requires a confirmed donor address and must be accepted \
                              manually through PayPal."
                .to_string(),
            Self::Intl => "Payment must be accepted manually through PayPal due to international \
                           account regulations."
                .to_string(),
            Self::MultiCurrency => "Payment received in non-shop currency and must be accepted \
                                    manually through PayPal."
                .to_string(),
            Self::PaymentReview | Self::RegulatoryReview => {
                "Payment is being reviewed by PayPal staff as high-risk or in possible violation \
                 of government regulations."
                    .to_string()
            }
            Self::Unilateral => {
                "Payment was sent to non-confirmed or non-registered email address.".to_string()
            }
            Self::Upgrade => {
                "PayPal account must be upgraded before this payment can be accepted.".to_string()
            }
            Self::Verify => {
                "PayPal account is not verified. Verify account in order to accept this donation."
                    .to_string()
            }
            Self::Other => {
                "Payment is pending for unknown reasons. Contact PayPal support for assistance."
                    .to_string()
            }
            Self::Unknown(reason) => format!("Payment is pending: {reason}"),
        }
    }
}

/// Notification fields exactly as the processor sent them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPaymentEvent {
    pub txn_type: Option<String>,
    pub payment_status: Option<String>,
    pub custom: Option<String>,
    pub txn_id: Option<String>,
    pub parent_txn_id: Option<String>,
    pub pending_reason: Option<String>,
    pub reason_code: Option<String>,
    pub mc_gross: Option<String>,
}

/// A validated payment-status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub txn_type: TransactionType,
    pub payment_status: PaymentStatus,
    /// Donation the event refers to, carried in `custom`.
    pub donation_id: i64,
    pub txn_id: Option<String>,
    pub parent_txn_id: Option<String>,
    pub pending_reason: Option<PendingReason>,
    pub reason_code: Option<String>,
    /// Gross amount; negative on refunds.
    pub gross: Option<Decimal>,
}

impl RawPaymentEvent {
    /// The notification's type, readable before any other field is checked.
    /// IPNs without a type are single payments.
    pub fn transaction_type(&self) -> TransactionType {
        present(self.txn_type.clone())
            .map(|t| TransactionType::parse(&t))
            .unwrap_or(TransactionType::WebAccept)
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<RawPaymentEvent> for PaymentEvent {
    type Error = FlowError;

    fn try_from(raw: RawPaymentEvent) -> Result<Self, Self::Error> {
        let txn_type = raw.transaction_type();
        let custom = present(raw.custom).ok_or(FlowError::MissingField("custom"))?;
        let donation_id = custom
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(FlowError::InvalidDonationId(custom))?;

        let payment_status = present(raw.payment_status)
            .map(|s| PaymentStatus::normalize(&s))
            .ok_or(FlowError::MissingField("payment_status"))?;

        let txn_id = present(raw.txn_id);
        if payment_status == PaymentStatus::Completed && txn_id.is_none() {
            return Err(FlowError::MissingTransactionId);
        }

        let gross = present(raw.mc_gross)
            .map(|g| Decimal::from_str(&g).map_err(|_| FlowError::InvalidAmount(g)))
            .transpose()?;

        Ok(Self {
            txn_type,
            payment_status,
            donation_id,
            txn_id,
            parent_txn_id: present(raw.parent_txn_id),
            pending_reason: present(raw.pending_reason).map(|r| PendingReason::parse(&r)),
            reason_code: present(raw.reason_code),
            gross,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRefunded,
    AlreadyPublished,
    /// The event would move the donation backwards.
    OutOfOrder {
        from: DonationStatus,
        to: DonationStatus,
    },
    NoPendingReason,
    UnhandledStatus(String),
    UnhandledTransactionType(String),
}

/// The single action an event implies for a donation in `current` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Hand the event to the refund collaborator.
    Refund,
    Complete { transaction_id: String, note: String },
    AnnotatePending { note: String },
    Skip(SkipReason),
}

pub fn plan_transition(current: DonationStatus, event: &PaymentEvent) -> Transition {
    if let TransactionType::Other(kind) = &event.txn_type {
        return Transition::Skip(SkipReason::UnhandledTransactionType(kind.clone()));
    }

    match &event.payment_status {
        PaymentStatus::Refunded | PaymentStatus::Reversed => {
            if current.is_refund_settled() {
                Transition::Skip(SkipReason::AlreadyRefunded)
            } else if current.is_terminal() {
                Transition::Skip(SkipReason::OutOfOrder {
                    from: current,
                    to: DonationStatus::Refunded,
                })
            } else {
                Transition::Refund
            }
        }
        PaymentStatus::Completed => {
            if current == DonationStatus::Publish {
                return Transition::Skip(SkipReason::AlreadyPublished);
            }
            if !current.can_transition_to(DonationStatus::Publish) {
                return Transition::Skip(SkipReason::OutOfOrder {
                    from: current,
                    to: DonationStatus::Publish,
                });
            }
            match &event.txn_id {
                Some(txn_id) => Transition::Complete {
                    transaction_id: txn_id.clone(),
                    note: format!("PayPal Transaction ID: {txn_id}"),
                },
                None => Transition::Skip(SkipReason::UnhandledStatus("completed".to_string())),
            }
        }
        PaymentStatus::Pending => match &event.pending_reason {
            Some(reason) => Transition::AnnotatePending {
                note: reason.note(),
            },
            None => Transition::Skip(SkipReason::NoPendingReason),
        },
        PaymentStatus::Unrecognized(status) => {
            Transition::Skip(SkipReason::UnhandledStatus(status.clone()))
        }
    }
}
