//! Outbound action links
//!
//! [`apply_params`] sets query parameters on a base URL without touching
//! the rest of it. Existing segments that are not overwritten are copied
//! byte-for-byte, so a pre-encoded query or a fragment survives intact.

use std::collections::HashSet;

use tracing::debug;
use url::{Url, form_urlencoded};

use crate::attribution::AttributionSnapshot;
use crate::config::{DEFAULT_INSTALLER_BASE_URL, DEFAULT_LAUNCHER_SOURCE, RuntimeConfig};
use crate::params::{Params, UrlParts};

/// Set every nonempty parameter on `base`.
///
/// Keys match case-sensitively; the first existing occurrence is
/// overwritten in place and later duplicates are dropped. New keys are
/// appended in the order given. The merged query is spliced back between
/// the untouched prefix and fragment, so `base` is never normalized: path
/// dot-segments, host casing, default ports and encodings all survive.
pub fn apply_params<I, K, V>(base: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut updates = Params::new();
    for (key, value) in params {
        let (key, value) = (key.as_ref(), value.as_ref());
        if !key.is_empty() && !value.is_empty() {
            updates.set(key, value);
        }
    }
    if updates.is_empty() {
        return base.to_string();
    }

    if let Err(e) = Url::parse(base) {
        debug!(base, error = %e, "Base is not an absolute URL");
    }

    let parts = UrlParts::split(base);
    let merged = merge_query(parts.query.unwrap_or(""), &updates);

    let mut out = String::with_capacity(base.len() + merged.len() + 1);
    out.push_str(parts.base);
    out.push('?');
    out.push_str(&merged);
    if let Some(fragment) = parts.fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Rewrite the raw query `raw` with `updates` applied.
fn merge_query(raw: &str, updates: &Params) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut applied: HashSet<&str> = HashSet::new();

    for segment in raw.split('&').filter(|s| !s.is_empty()) {
        let raw_key = segment.split_once('=').map_or(segment, |(key, _)| key);
        let key = decode_key(raw_key);
        match updates.iter().find(|(k, _)| *k == key) {
            Some((k, v)) => {
                if applied.insert(k) {
                    segments.push(encode_pair(k, v));
                }
            }
            None => segments.push(segment.to_string()),
        }
    }

    for (key, value) in updates.iter() {
        if !applied.contains(key) {
            segments.push(encode_pair(key, value));
        }
    }

    segments.join("&")
}

fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn encode_pair(key: &str, value: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
}

/// Upgrade protocol-relative and plain-http URLs to https.
pub fn to_https(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("http:") {
        format!("https:{rest}")
    } else {
        url.to_string()
    }
}

/// Download link for the installer, or `None` when no partner id (or
/// extension id) is configured.
pub fn installer_url(config: &RuntimeConfig, snapshot: &AttributionSnapshot) -> Option<String> {
    let partner_id = config.installer_partner_id.trim();
    if partner_id.is_empty() {
        debug!("No installer partner id configured, withholding installer link");
        return None;
    }
    let extension_id = config.installer_extension_id.trim();
    if extension_id.is_empty() {
        debug!("No installer extension id configured, withholding installer link");
        return None;
    }
    let base = match config.installer_base_url.trim() {
        "" => DEFAULT_INSTALLER_BASE_URL,
        base => base,
    };

    let term = first_nonempty(&config.installer_utm_term, snapshot.term.as_deref());
    let content = first_nonempty(&config.installer_utm_content, snapshot.content.as_deref());
    let raf_token = snapshot.raf_token.as_deref().unwrap_or_default();

    let named = [
        ("PartnerId", partner_id),
        ("ExtensionId", extension_id),
        ("utm_source", snapshot.source.as_str()),
        ("utm_medium", snapshot.medium.as_str()),
        ("utm_campaign", snapshot.campaign.as_str()),
        ("utm_term", term),
        ("utm_content", content),
        ("raf_token", raf_token),
    ];
    let extra = snapshot
        .extra_utm
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()));

    Some(apply_params(&to_https(base), named.into_iter().chain(extra)))
}

/// App deep link carrying the `source` the launcher should report.
///
/// `None` only when no launcher base is configured.
pub fn launcher_url(config: &RuntimeConfig, snapshot: &AttributionSnapshot) -> Option<String> {
    let base = config.launcher_base_url.trim();
    if base.is_empty() {
        debug!("No launcher base configured, withholding launcher link");
        return None;
    }
    Some(apply_params(base, [("source", launcher_source(config, snapshot))]))
}

/// Only the landing URL's own `utm_source` is forwarded; a persisted one
/// from an earlier visit is not.
fn launcher_source<'a>(config: &'a RuntimeConfig, snapshot: &'a AttributionSnapshot) -> &'a str {
    let utm_source = snapshot.url_source.trim();
    let passes = config.launcher_sources.is_empty()
        || config.launcher_sources.iter().any(|s| s == utm_source);
    if !utm_source.is_empty() && passes {
        return utm_source;
    }
    match config.launcher_source_fallback.trim() {
        "" => DEFAULT_LAUNCHER_SOURCE,
        fallback => fallback,
    }
}

fn first_nonempty<'a>(configured: &'a str, fallback: Option<&'a str>) -> &'a str {
    if configured.is_empty() {
        fallback.unwrap_or_default()
    } else {
        configured
    }
}
