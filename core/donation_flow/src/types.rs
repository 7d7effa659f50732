//! # Types
//!
//! Shared data structures for redirects and reconciliation.
//!
//! ## Donation status as a partial order
//!
//! ```text
//! Draft ──► Pending ──► Publish ──► Refunded
//!   │          │                └──► Reversed
//!   └──────────┴──► Failed
//! ```
//!
//! Forward skips (`Pending → Refunded`) are allowed. `Refunded`, `Reversed`
//! and `Failed` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::markers::create_failed_page_url;
use crate::FlowError;

/// Lifecycle status of a donation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Draft,
    Pending,
    /// Payment confirmed.
    Publish,
    Refunded,
    Reversed,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Publish => "publish",
            Self::Refunded => "refunded",
            Self::Reversed => "reversed",
            Self::Failed => "failed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Pending => 1,
            Self::Publish => 2,
            Self::Refunded | Self::Reversed => 3,
            Self::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Refunded | Self::Reversed | Self::Failed)
    }

    /// `true` once money has gone back to the donor, whichever way.
    pub fn is_refund_settled(self) -> bool {
        matches!(self, Self::Refunded | Self::Reversed)
    }

    /// Whether `self → to` moves forward in the status order.
    pub fn can_transition_to(self, to: DonationStatus) -> bool {
        if self == to || self.is_terminal() {
            return false;
        }
        match to {
            Self::Draft => false,
            Self::Failed => matches!(self, Self::Draft | Self::Pending),
            _ => to.rank() > self.rank(),
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "publish" => Ok(Self::Publish),
            "refunded" => Ok(Self::Refunded),
            "reversed" => Ok(Self::Reversed),
            "failed" => Ok(Self::Failed),
            other => Err(FlowError::UnknownStatus(other.to_string())),
        }
    }
}

/// Views a theme can supply a template for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Form,
    Receipt,
    DonationProcessing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatePaths {
    pub form: String,
    pub receipt: String,
    pub donation_processing: String,
}

impl Default for TemplatePaths {
    fn default() -> Self {
        Self {
            form: "views/form/default_form.html".to_string(),
            receipt: "views/form/default_receipt.html".to_string(),
            donation_processing: "views/form/default_donation_processing.html".to_string(),
        }
    }
}

pub const DEFAULT_FAILED_DONATION_MESSAGE: &str =
    "We're sorry, your donation failed to process. Please try again or contact site support.";

/// Per-theme settings consulted when deciding where a donor lands.
///
/// Both iframe flags default to `true`; a theme that sets one to `false`
/// sends the donor to the page in the top-level window instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled")]
    pub open_success_page_in_iframe: bool,
    #[serde(default = "enabled")]
    pub open_failed_page_in_iframe: bool,
    #[serde(default = "default_failed_message")]
    pub failed_donation_message: String,
    #[serde(default)]
    pub templates: TemplatePaths,
}

fn enabled() -> bool {
    true
}

fn default_failed_message() -> String {
    DEFAULT_FAILED_DONATION_MESSAGE.to_string()
}

impl ThemeConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            open_success_page_in_iframe: true,
            open_failed_page_in_iframe: true,
            failed_donation_message: default_failed_message(),
            templates: TemplatePaths::default(),
        }
    }

    pub fn template(&self, view: View) -> &str {
        match view {
            View::Form => &self.templates.form,
            View::Receipt => &self.templates.receipt,
            View::DonationProcessing => &self.templates.donation_processing,
        }
    }

    /// Failed-donation page for a form: its embed route with the failed action.
    pub fn failed_page_url(&self, form_route: &Url) -> Url {
        create_failed_page_url(form_route)
    }
}

/// Site-wide addresses configured by the administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    /// Home URL; its origin is the only origin allowed inside the iframe.
    pub home: Url,
    pub success_page: Url,
    /// Legacy (non-embedded) failed-donation page.
    pub failed_page: Url,
    /// Base under which each form's embed route lives.
    pub form_route_base: Url,
}

impl SiteUrls {
    /// Embed route of a form, `{form_route_base}/{slug}`.
    pub fn form_route(&self, slug: &str) -> Url {
        let mut url = self.form_route_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(slug);
        }
        url
    }
}
