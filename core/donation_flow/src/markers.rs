//! Query-string markers exchanged between the embedded form, its parent page
//! and the redirect endpoints.
//!
//! | Key                        | Meaning                                          |
//! |----------------------------|--------------------------------------------------|
//! | `giveDonationAction`       | one-shot action: `showReceipt` / `failedDonation` |
//! | `showFailedDonationError`  | one-shot flag: show the failed-donation banner   |
//! | `give-current-url`         | address of the page embedding the form           |
//! | `give-form-id`             | form being processed                             |
//! | `giveDonationFormInIframe` | request originates inside the iframe             |

use url::{form_urlencoded, Url};

pub const DONATION_ACTION: &str = "giveDonationAction";
pub const SHOW_RECEIPT: &str = "showReceipt";
pub const FAILED_DONATION: &str = "failedDonation";
pub const SHOW_FAILED_DONATION_ERROR: &str = "showFailedDonationError";
pub const CURRENT_URL: &str = "give-current-url";
pub const FORM_ID: &str = "give-form-id";
pub const IN_IFRAME: &str = "giveDonationFormInIframe";

/// Query pairs exactly as they appear in the URL, still encoded.
fn raw_pairs(url: &Url) -> Vec<String> {
    url.query()
        .map(|q| {
            q.split('&')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn pair_key(pair: &str) -> String {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

fn encode_pair(key: &str, value: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
}

/// Untouched pairs keep their original encoding.
fn with_pairs(url: &Url, pairs: &[String]) -> Url {
    let mut out = url.clone();
    if pairs.is_empty() {
        out.set_query(None);
    } else {
        out.set_query(Some(&pairs.join("&")));
    }
    out
}

/// Put an already-encoded `pair` under `key`, replacing the first existing
/// pair in place and dropping later duplicates.
fn set_pair(url: &Url, key: &str, pair: String) -> Url {
    let mut pairs = raw_pairs(url);
    match pairs.iter().position(|p| pair_key(p) == key) {
        Some(idx) => {
            pairs[idx] = pair;
            let mut position = 0;
            pairs.retain(|p| {
                let keep = position == idx || pair_key(p) != key;
                position += 1;
                keep
            });
        }
        None => pairs.push(pair),
    }
    with_pairs(url, &pairs)
}

/// Set `key=value`, replacing any existing value in place.
pub fn add_query_arg(url: &Url, key: &str, value: &str) -> Url {
    set_pair(url, key, encode_pair(key, value))
}

pub fn remove_query_args(url: &Url, keys: &[&str]) -> Url {
    let pairs: Vec<_> = raw_pairs(url)
        .into_iter()
        .filter(|p| !keys.contains(&pair_key(p).as_str()))
        .collect();
    with_pairs(url, &pairs)
}

pub fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Present with a value other than empty or `0`.
pub fn has_query_flag(url: &Url, key: &str) -> bool {
    query_value(url, key).is_some_and(|v| !v.is_empty() && v != "0")
}

/// Re-address `location` at `target`, carrying `location`'s query arguments
/// over `target`'s own.
pub fn switch_requested_url(location: &Url, target: &Url) -> Url {
    raw_pairs(location)
        .into_iter()
        .fold(target.clone(), |url, pair| {
            let key = pair_key(&pair);
            set_pair(&url, &key, pair)
        })
}

pub fn create_success_page_url(url: &Url) -> Url {
    add_query_arg(url, DONATION_ACTION, SHOW_RECEIPT)
}

pub fn create_failed_page_url(url: &Url) -> Url {
    add_query_arg(url, DONATION_ACTION, FAILED_DONATION)
}

pub fn is_iframe_parent_success_url(url: &Url) -> bool {
    query_value(url, DONATION_ACTION).as_deref() == Some(SHOW_RECEIPT)
}

pub fn is_iframe_parent_failed_url(url: &Url) -> bool {
    query_value(url, DONATION_ACTION).as_deref() == Some(FAILED_DONATION)
}

pub fn remove_donation_action(url: &Url) -> Url {
    remove_query_args(url, &[DONATION_ACTION])
}

/// Drop the one-shot receipt / error markers once they have been consumed,
/// so a refresh or back-navigation does not trigger them again.
pub fn strip_transient_action_markers(url: &Url) -> Url {
    remove_query_args(url, &[DONATION_ACTION, SHOW_FAILED_DONATION_ERROR])
}

/// The address a URL points at, ignoring one-shot markers, embed bookkeeping
/// and the fragment.
pub fn canonical_address(url: &Url) -> Url {
    let mut out = remove_query_args(
        url,
        &[DONATION_ACTION, SHOW_FAILED_DONATION_ERROR, CURRENT_URL, IN_IFRAME],
    );
    out.set_fragment(None);
    out
}
