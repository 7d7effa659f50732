//! Where a donor lands after submitting an embedded form.
//!
//! Every decision resolves to a destination plus a [`RenderMode`]: either the
//! iframe navigates itself, or the caller must emit a bridge page that moves
//! the top-level window. Anything outside the site's origin, or any request
//! without a resolvable theme, ends up in the window.

use url::Url;

use crate::markers::{
    add_query_arg, canonical_address, create_failed_page_url, create_success_page_url,
    has_query_flag, is_iframe_parent_failed_url, is_iframe_parent_success_url, query_value,
    remove_donation_action, switch_requested_url, CURRENT_URL, FORM_ID, IN_IFRAME,
    SHOW_FAILED_DONATION_ERROR,
};
use crate::types::{SiteUrls, ThemeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Iframe,
    Window,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iframe => "iframe",
            Self::Window => "window",
        }
    }
}

/// Which rule produced a decision. Logged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    CrossOrigin,
    /// Destination is the page already being shown; loading it in the iframe would loop.
    SelfRedirect,
    UnresolvedTheme,
    MissingEmbedParent,
    ThemeIframe,
    ThemeWindow,
    /// An ordinary same-site redirect left untouched.
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectDecision {
    pub destination: Url,
    pub render_mode: RenderMode,
    pub reason: RedirectReason,
}

impl RedirectDecision {
    pub fn iframe(destination: Url, reason: RedirectReason) -> Self {
        Self {
            destination,
            render_mode: RenderMode::Iframe,
            reason,
        }
    }

    pub fn window(destination: Url, reason: RedirectReason) -> Self {
        Self {
            destination,
            render_mode: RenderMode::Window,
            reason,
        }
    }
}

/// Request-scoped inputs for a redirect decision.
#[derive(Debug, Clone)]
pub struct RedirectContext<'a> {
    pub site: &'a SiteUrls,
    /// Address of the request being handled (the form's embed route).
    pub request_url: Url,
    /// Page embedding the form, from `give-current-url`.
    pub embed_parent_url: Option<Url>,
    pub in_iframe: bool,
    /// Embed route of the form being processed.
    pub form_route: Url,
}

impl<'a> RedirectContext<'a> {
    /// Build the context from the incoming request URL, reading the embed
    /// parent and iframe flag from its query string.
    pub fn from_request(site: &'a SiteUrls, request_url: Url, form_route: Url) -> Self {
        let embed_parent_url = query_value(&request_url, CURRENT_URL)
            .and_then(|raw| Url::parse(raw.trim()).ok());
        let in_iframe = has_query_flag(&request_url, IN_IFRAME);
        Self {
            site,
            request_url,
            embed_parent_url,
            in_iframe,
            form_route,
        }
    }

    /// Scheme, host and port match the site home URL.
    pub fn is_same_origin_redirect(&self, location: &Url) -> bool {
        location.origin() == self.site.home.origin()
    }

    fn is_current_address(&self, location: &Url) -> bool {
        canonical_address(location) == canonical_address(&self.request_url)
    }
}

fn decide(
    location: &Url,
    open_in_iframe: Option<bool>,
    ctx: &RedirectContext<'_>,
    rewrite: impl FnOnce(&Url) -> Url,
) -> RedirectDecision {
    if !ctx.is_same_origin_redirect(location) {
        return RedirectDecision::window(location.clone(), RedirectReason::CrossOrigin);
    }
    if ctx.is_current_address(location) {
        return RedirectDecision::window(location.clone(), RedirectReason::SelfRedirect);
    }
    let Some(open_in_iframe) = open_in_iframe else {
        return RedirectDecision::window(location.clone(), RedirectReason::UnresolvedTheme);
    };
    if !open_in_iframe {
        return RedirectDecision::window(location.clone(), RedirectReason::ThemeWindow);
    }
    let Some(parent) = &ctx.embed_parent_url else {
        return RedirectDecision::window(location.clone(), RedirectReason::MissingEmbedParent);
    };
    // A form embedded on another site gets its parent page reloaded at top level.
    let destination = rewrite(parent);
    if !ctx.is_same_origin_redirect(&destination) {
        return RedirectDecision::window(destination, RedirectReason::CrossOrigin);
    }
    RedirectDecision::iframe(destination, RedirectReason::ThemeIframe)
}

/// Success destination for a processed donation.
///
/// With success-in-iframe enabled the location is re-addressed at the embed
/// parent page and tagged `giveDonationAction=showReceipt`.
pub fn compute_success_redirect(
    location: &Url,
    theme: Option<&ThemeConfig>,
    ctx: &RedirectContext<'_>,
) -> RedirectDecision {
    decide(
        location,
        theme.map(|t| t.open_success_page_in_iframe),
        ctx,
        |parent| create_success_page_url(&switch_requested_url(location, parent)),
    )
}

/// Failure destination for a donation; iframe destinations also carry
/// `showFailedDonationError=1` and the form id.
pub fn compute_failed_redirect(
    location: &Url,
    theme: Option<&ThemeConfig>,
    form_id: i64,
    ctx: &RedirectContext<'_>,
) -> RedirectDecision {
    decide(
        location,
        theme.map(|t| t.open_failed_page_in_iframe),
        ctx,
        |parent| {
            let url = create_failed_page_url(&switch_requested_url(location, parent));
            let url = add_query_arg(&url, SHOW_FAILED_DONATION_ERROR, "1");
            add_query_arg(&url, FORM_ID, &form_id.to_string())
        },
    )
}

/// Any redirect issued while a donation is being processed, including the
/// return leg of an offsite checkout.
pub fn resolve_offsite_redirect(
    location: &Url,
    theme: Option<&ThemeConfig>,
    ctx: &RedirectContext<'_>,
) -> RedirectDecision {
    if !ctx.is_same_origin_redirect(location) {
        return RedirectDecision::window(location.clone(), RedirectReason::CrossOrigin);
    }
    let Some(theme) = theme else {
        return RedirectDecision::window(location.clone(), RedirectReason::UnresolvedTheme);
    };

    if is_iframe_parent_success_url(location) {
        let destination = remove_donation_action(&ctx.site.success_page);
        return if theme.open_success_page_in_iframe {
            RedirectDecision::iframe(destination, RedirectReason::ThemeIframe)
        } else {
            RedirectDecision::window(destination, RedirectReason::ThemeWindow)
        };
    }

    if is_iframe_parent_failed_url(location) {
        if !theme.open_failed_page_in_iframe {
            return RedirectDecision::window(
                ctx.site.failed_page.clone(),
                RedirectReason::ThemeWindow,
            );
        }
        let failed = add_query_arg(
            &theme.failed_page_url(&ctx.form_route),
            SHOW_FAILED_DONATION_ERROR,
            "1",
        );
        return RedirectDecision::iframe(
            remove_donation_action(&failed),
            RedirectReason::ThemeIframe,
        );
    }

    let under = |page: &Url| location.as_str().starts_with(page.as_str());
    if (!theme.open_success_page_in_iframe && under(&ctx.site.success_page))
        || (!theme.open_failed_page_in_iframe && under(&ctx.site.failed_page))
    {
        return RedirectDecision::window(location.clone(), RedirectReason::ThemeWindow);
    }

    RedirectDecision::iframe(location.clone(), RedirectReason::Passthrough)
}

/// Send the donor back to the form after a validation error: the redirect's
/// query string survives, everything before `?` becomes the form's embed route.
pub fn rewrite_checkout_error_redirect(redirect: &str, form_route: &Url) -> Url {
    let mut url = form_route.clone();
    let query = redirect
        .split_once('?')
        .map(|(_, q)| q.split_once('#').map_or(q, |(q, _)| q))
        .filter(|q| !q.is_empty());
    url.set_query(query);
    url
}
