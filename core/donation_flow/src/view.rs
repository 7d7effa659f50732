//! Which theme template, if any, renders an embed request.

use serde::Serialize;

use crate::markers::{has_query_flag, is_iframe_parent_success_url, SHOW_FAILED_DONATION_ERROR};
use crate::redirect::RedirectContext;
use crate::types::{ThemeConfig, View};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum FormView {
    /// Theme receipt template, rendered directly.
    Receipt { template: String },
    /// Success page rendered normally with the receipt placed in its content.
    SuccessPage,
    /// Theme donation-form template.
    Form {
        template: String,
        failed_donation_error: Option<String>,
    },
    /// Not handled by a theme.
    Passthrough { failed_donation_error: Option<String> },
}

impl FormView {
    /// Only the plain page without a failure message may be cached. Receipts,
    /// success pages and themed forms carry per-donor content.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Passthrough { failed_donation_error: None })
    }
}

/// Pick the view for an embed request. Without a theme (legacy form, or a
/// theme id nobody registered) the plain page renders.
pub fn resolve_view(ctx: &RedirectContext<'_>, theme: Option<&ThemeConfig>) -> FormView {
    let Some(theme) = theme else {
        return FormView::Passthrough {
            failed_donation_error: None,
        };
    };

    let url = &ctx.request_url;
    if is_iframe_parent_success_url(url) {
        if theme.open_success_page_in_iframe || ctx.in_iframe {
            return FormView::Receipt {
                template: theme.template(View::Receipt).to_string(),
            };
        }
        return FormView::SuccessPage;
    }

    let failed_donation_error = has_query_flag(url, SHOW_FAILED_DONATION_ERROR)
        .then(|| theme.failed_donation_message.clone());

    if ctx.in_iframe {
        return FormView::Form {
            template: theme.template(View::Form).to_string(),
            failed_donation_error,
        };
    }

    FormView::Passthrough {
        failed_donation_error,
    }
}
