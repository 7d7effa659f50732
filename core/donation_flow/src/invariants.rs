#![allow(dead_code)]

use url::Url;

use crate::redirect::{RedirectContext, RedirectDecision, RenderMode};
use crate::types::DonationStatus;
use crate::Transition;

/// INV-1: a planned status change only ever moves forward in the status order.
pub fn assert_valid_status_transition(from: DonationStatus, to: DonationStatus) {
    assert!(
        from.can_transition_to(to),
        "INV-1 violated: invalid status transition from {from:?} to {to:?}"
    );
}

/// INV-2: a destination outside the site's origin is never loaded in the iframe.
pub fn assert_cross_origin_escapes(ctx: &RedirectContext<'_>, decision: &RedirectDecision) {
    if !ctx.is_same_origin_redirect(&decision.destination) {
        assert_eq!(
            decision.render_mode,
            RenderMode::Window,
            "INV-2 violated: cross-origin destination {} rendered in iframe",
            decision.destination
        );
    }
}

/// INV-3: whatever happens to the query, the destination of an iframe
/// decision stays on the site.
pub fn assert_iframe_stays_on_site(home: &Url, decision: &RedirectDecision) {
    if decision.render_mode == RenderMode::Iframe {
        assert_eq!(
            decision.destination.origin(),
            home.origin(),
            "INV-3 violated: iframe destination {} leaves the site",
            decision.destination
        );
    }
}

/// INV-4: re-planning against the status a transition produced is a skip.
pub fn assert_replay_is_skip(replayed: &Transition) {
    assert!(
        matches!(replayed, Transition::Skip(_)),
        "INV-4 violated: replayed event planned {replayed:?}"
    );
}

/// INV-5: notes are append-only.
pub fn assert_notes_append_only(before: &[String], after: &[String]) {
    assert!(
        after.len() >= before.len() && after[..before.len()] == *before,
        "INV-5 violated: note log rewritten ({} -> {} entries)",
        before.len(),
        after.len()
    );
}
