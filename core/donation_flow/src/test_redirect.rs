use url::Url;

use crate::invariants::{assert_cross_origin_escapes, assert_iframe_stays_on_site};
use crate::{
    compute_failed_redirect, compute_success_redirect, resolve_offsite_redirect, resolve_view,
    rewrite_checkout_error_redirect, FormView, RedirectContext, RedirectReason, RenderMode,
    SiteUrls, ThemeConfig,
};

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn site() -> SiteUrls {
    SiteUrls {
        home: url("https://example.org"),
        success_page: url("https://example.org/donation-confirmation"),
        failed_page: url("https://example.org/donation-failed"),
        form_route_base: url("https://example.org/give"),
    }
}

fn form_route(site: &SiteUrls) -> Url {
    site.form_route("spring-appeal")
}

fn embedded_ctx(site: &SiteUrls) -> RedirectContext<'_> {
    let request = url(
        "https://example.org/give/spring-appeal?giveDonationFormInIframe=1\
         &give-current-url=https%3A%2F%2Fexample.org%2Fcampaign",
    );
    RedirectContext::from_request(site, request, form_route(site))
}

fn theme(success_in_iframe: bool, failed_in_iframe: bool) -> ThemeConfig {
    let mut theme = ThemeConfig::new("sequoia", "Multi-Step");
    theme.open_success_page_in_iframe = success_in_iframe;
    theme.open_failed_page_in_iframe = failed_in_iframe;
    theme
}

#[test]
fn test_context_reads_embed_parameters() {
    let site = site();
    let ctx = embedded_ctx(&site);
    assert!(ctx.in_iframe);
    assert_eq!(
        ctx.embed_parent_url.as_ref().map(Url::as_str),
        Some("https://example.org/campaign")
    );
}

#[test]
fn test_success_redirect_rewrites_to_embed_parent() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/donation-confirmation?payment-id=12");

    let decision = compute_success_redirect(&location, Some(&theme(true, true)), &ctx);

    assert_eq!(decision.render_mode, RenderMode::Iframe);
    assert_eq!(decision.reason, RedirectReason::ThemeIframe);
    assert_eq!(
        decision.destination.as_str(),
        "https://example.org/campaign?payment-id=12&giveDonationAction=showReceipt"
    );
}

#[test]
fn test_success_redirect_honours_window_flag() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/donation-confirmation?payment-id=12");

    let decision = compute_success_redirect(&location, Some(&theme(false, true)), &ctx);

    assert_eq!(decision.render_mode, RenderMode::Window);
    assert_eq!(decision.reason, RedirectReason::ThemeWindow);
    assert_eq!(decision.destination, location);
}

#[test]
fn test_cross_origin_target_always_escapes() {
    let site = site();
    let ctx = embedded_ctx(&site);
    for location in [
        "https://www.paypal.com/cgi-bin/webscr?cmd=_xclick",
        "http://example.org/donation-confirmation",
        "https://example.org:8443/donation-confirmation",
        "https://evil.example.org/donation-confirmation",
    ] {
        let location = url(location);
        for theme in [theme(true, true), theme(false, false)] {
            let success = compute_success_redirect(&location, Some(&theme), &ctx);
            let failed = compute_failed_redirect(&location, Some(&theme), 7, &ctx);
            for decision in [success, failed] {
                assert_eq!(decision.render_mode, RenderMode::Window);
                assert_eq!(decision.reason, RedirectReason::CrossOrigin);
                assert_eq!(decision.destination, location);
            }
        }
    }
}

#[test]
fn test_unresolved_theme_fails_closed() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/donation-failed");

    let success = compute_success_redirect(&location, None, &ctx);
    let failed = compute_failed_redirect(&location, None, 7, &ctx);
    let offsite = resolve_offsite_redirect(&location, None, &ctx);

    for decision in [success, failed, offsite] {
        assert_eq!(decision.render_mode, RenderMode::Window);
        assert_eq!(decision.reason, RedirectReason::UnresolvedTheme);
        assert_eq!(decision.destination, location);
    }
}

#[test]
fn test_redirect_to_current_page_escapes_iframe() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/give/spring-appeal?giveDonationAction=showReceipt");

    let decision = compute_success_redirect(&location, Some(&theme(true, true)), &ctx);

    assert_eq!(decision.render_mode, RenderMode::Window);
    assert_eq!(decision.reason, RedirectReason::SelfRedirect);
}

#[test]
fn test_missing_embed_parent_uses_window() {
    let site = site();
    let ctx = RedirectContext::from_request(
        &site,
        url("https://example.org/give/spring-appeal?giveDonationFormInIframe=1"),
        form_route(&site),
    );
    let location = url("https://example.org/donation-confirmation");

    let decision = compute_success_redirect(&location, Some(&theme(true, true)), &ctx);

    assert_eq!(decision.render_mode, RenderMode::Window);
    assert_eq!(decision.reason, RedirectReason::MissingEmbedParent);
    assert_eq!(decision.destination, location);
}

#[test]
fn test_off_site_embed_parent_reloads_top_window() {
    let site = site();
    let ctx = RedirectContext::from_request(
        &site,
        url("https://example.org/give/spring-appeal\
             ?give-current-url=https%3A%2F%2Fpartner.example.com%2Fgive"),
        form_route(&site),
    );
    let location = url("https://example.org/donation-confirmation");

    let decision = compute_success_redirect(&location, Some(&theme(true, true)), &ctx);

    assert_eq!(decision.render_mode, RenderMode::Window);
    assert_eq!(decision.reason, RedirectReason::CrossOrigin);
    assert_eq!(
        decision.destination.as_str(),
        "https://partner.example.com/give?giveDonationAction=showReceipt"
    );
}

#[test]
fn test_failed_redirect_marks_error_banner() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/donation-failed");

    let decision = compute_failed_redirect(&location, Some(&theme(true, true)), 7, &ctx);

    assert_eq!(decision.render_mode, RenderMode::Iframe);
    assert_eq!(
        decision.destination.as_str(),
        "https://example.org/campaign?giveDonationAction=failedDonation\
         &showFailedDonationError=1&give-form-id=7"
    );
}

#[test]
fn test_failed_redirect_honours_window_flag() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/donation-failed");

    let decision = compute_failed_redirect(&location, Some(&theme(true, false)), 7, &ctx);

    assert_eq!(decision.render_mode, RenderMode::Window);
    assert_eq!(decision.destination, location);
}

#[test]
fn test_offsite_return_to_parent_success_page() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/campaign?giveDonationAction=showReceipt");

    let inside = resolve_offsite_redirect(&location, Some(&theme(true, true)), &ctx);
    assert_eq!(inside.render_mode, RenderMode::Iframe);
    assert_eq!(
        inside.destination.as_str(),
        "https://example.org/donation-confirmation"
    );

    let outside = resolve_offsite_redirect(&location, Some(&theme(false, true)), &ctx);
    assert_eq!(outside.render_mode, RenderMode::Window);
    assert_eq!(outside.destination, inside.destination);
}

#[test]
fn test_offsite_return_to_parent_failed_page() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let location = url("https://example.org/campaign?giveDonationAction=failedDonation");

    let inside = resolve_offsite_redirect(&location, Some(&theme(true, true)), &ctx);
    assert_eq!(inside.render_mode, RenderMode::Iframe);
    assert_eq!(
        inside.destination.as_str(),
        "https://example.org/give/spring-appeal?showFailedDonationError=1"
    );

    let outside = resolve_offsite_redirect(&location, Some(&theme(true, false)), &ctx);
    assert_eq!(outside.render_mode, RenderMode::Window);
    assert_eq!(outside.destination.as_str(), "https://example.org/donation-failed");
}

#[test]
fn test_offsite_plain_redirects() {
    let site = site();
    let ctx = embedded_ctx(&site);
    let confirmation = url("https://example.org/donation-confirmation?payment-id=3");

    let escaped = resolve_offsite_redirect(&confirmation, Some(&theme(false, true)), &ctx);
    assert_eq!(escaped.render_mode, RenderMode::Window);
    assert_eq!(escaped.destination, confirmation);

    let kept = resolve_offsite_redirect(&confirmation, Some(&theme(true, true)), &ctx);
    assert_eq!(kept.render_mode, RenderMode::Iframe);
    assert_eq!(kept.reason, RedirectReason::Passthrough);

    let paypal = url("https://www.paypal.com/cgi-bin/webscr?cmd=_xclick");
    let offsite = resolve_offsite_redirect(&paypal, Some(&theme(true, true)), &ctx);
    assert_eq!(offsite.render_mode, RenderMode::Window);
    assert_eq!(offsite.reason, RedirectReason::CrossOrigin);
}

#[test]
fn test_checkout_error_returns_to_form_route() {
    let site = site();
    let route = form_route(&site);

    let rewritten = rewrite_checkout_error_redirect(
        "https://example.org/?payment-mode=paypal&form-id=7#give-form",
        &route,
    );
    assert_eq!(
        rewritten.as_str(),
        "https://example.org/give/spring-appeal?payment-mode=paypal&form-id=7"
    );

    let bare = rewrite_checkout_error_redirect("https://example.org/checkout", &route);
    assert_eq!(bare, route);
}

#[test]
fn test_view_receipt_in_iframe() {
    let site = site();
    let ctx = RedirectContext::from_request(
        &site,
        url("https://example.org/give/spring-appeal\
             ?giveDonationAction=showReceipt&giveDonationFormInIframe=1"),
        form_route(&site),
    );

    let view = resolve_view(&ctx, Some(&theme(false, true)));

    assert_eq!(
        view,
        FormView::Receipt {
            template: "views/form/default_receipt.html".to_string()
        }
    );
    assert!(!view.is_cacheable());
}

#[test]
fn test_view_receipt_on_success_page() {
    let site = site();
    let ctx = RedirectContext::from_request(
        &site,
        url("https://example.org/donation-confirmation?giveDonationAction=showReceipt"),
        form_route(&site),
    );

    let view = resolve_view(&ctx, Some(&theme(false, true)));

    assert_eq!(view, FormView::SuccessPage);
    assert!(!view.is_cacheable());
}

#[test]
fn test_view_form_with_failed_banner() {
    let site = site();
    let ctx = RedirectContext::from_request(
        &site,
        url("https://example.org/give/spring-appeal\
             ?giveDonationFormInIframe=1&showFailedDonationError=1"),
        form_route(&site),
    );
    let theme = theme(true, true);

    let view = resolve_view(&ctx, Some(&theme));

    assert_eq!(
        view,
        FormView::Form {
            template: "views/form/default_form.html".to_string(),
            failed_donation_error: Some(theme.failed_donation_message.clone()),
        }
    );
}

#[test]
fn test_view_without_theme_passes_through() {
    let site = site();
    let ctx = embedded_ctx(&site);

    let view = resolve_view(&ctx, None);

    assert_eq!(
        view,
        FormView::Passthrough {
            failed_donation_error: None
        }
    );
}

#[test]
fn test_origin_invariants_across_inputs() {
    let site = site();
    let contexts = [
        embedded_ctx(&site),
        RedirectContext::from_request(
            &site,
            url("https://example.org/give/spring-appeal\
                 ?give-current-url=https%3A%2F%2Fpartner.example.com%2F"),
            form_route(&site),
        ),
    ];
    let locations = [
        "https://example.org/donation-confirmation",
        "https://example.org/donation-failed?reason=declined",
        "https://example.org/campaign?giveDonationAction=showReceipt",
        "https://example.org/campaign?giveDonationAction=failedDonation",
        "https://www.paypal.com/cgi-bin/webscr",
    ];
    for ctx in &contexts {
        for location in locations {
            let location = url(location);
            for (s, f) in [(true, true), (true, false), (false, true), (false, false)] {
                let theme = theme(s, f);
                for decision in [
                    compute_success_redirect(&location, Some(&theme), ctx),
                    compute_failed_redirect(&location, Some(&theme), 7, ctx),
                    resolve_offsite_redirect(&location, Some(&theme), ctx),
                ] {
                    assert_cross_origin_escapes(ctx, &decision);
                    assert_iframe_stays_on_site(&site.home, &decision);
                }
            }
        }
    }
}
