//! Attribution snapshot and its durable record
//!
//! A snapshot is computed once per page load from the landing URL, the
//! document referrer and whatever an earlier visit persisted. URL values win
//! only when nonempty, so a bare revisit keeps the original campaign.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::StorageError;
use crate::params::{Params, UrlParts};
use crate::storage::KeyValueStorage;

/// Storage key holding the serialized [`PersistedAttribution`]
pub const DEFAULT_STORAGE_KEY: &str = "outplayed_lp_utm";

/// Query keys that may carry a referral token, in precedence order
const RAF_KEYS: [&str; 3] = ["rafToken", "raf_token", "raf"];

/// UTM keys with a dedicated snapshot field
const NAMED_UTM_KEYS: [&str; 5] = [
    "utm_campaign",
    "utm_medium",
    "utm_source",
    "utm_term",
    "utm_content",
];

/// What the page knows about the current request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    /// Full landing URL including query and fragment
    pub url: String,
    /// `document.referrer`; `None` when blocked or unavailable
    pub referrer: Option<String>,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }
}

/// Canonical attribution for one page load
///
/// Serializes to the beacon's extra-data shape: `campaign`, `medium`,
/// `source`, optional `term`/`content`, and `referral`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSnapshot {
    pub campaign: String,
    pub medium: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "referral")]
    pub referrer: String,
    #[serde(skip)]
    pub raf_token: Option<String>,
    /// `utm_source` of this landing URL alone, ignoring persisted state
    #[serde(skip)]
    pub url_source: String,
    /// Any other nonempty `utm_*` pairs, persisted and forwarded to the
    /// installer but not reported in beacons
    #[serde(skip)]
    pub extra_utm: BTreeMap<String, String>,
}

impl AttributionSnapshot {
    /// The durable subset to persist for later loads.
    pub fn durable(&self) -> PersistedAttribution {
        PersistedAttribution {
            utm_campaign: self.campaign.clone(),
            utm_medium: self.medium.clone(),
            utm_source: self.source.clone(),
            utm_term: self.term.clone().unwrap_or_default(),
            utm_content: self.content.clone().unwrap_or_default(),
            raf_token: self.raf_token.clone().unwrap_or_default(),
            extra_utm: self.extra_utm.clone(),
        }
    }
}

/// Attribution fields that survive across page loads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAttribution {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_campaign: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_medium: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_term: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub utm_content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raf_token: String,
    /// Other `utm_*` keys, stored alongside the named ones
    #[serde(flatten)]
    pub extra_utm: BTreeMap<String, String>,
}

impl PersistedAttribution {
    pub fn is_empty(&self) -> bool {
        self.utm_campaign.is_empty()
            && self.utm_medium.is_empty()
            && self.utm_source.is_empty()
            && self.utm_term.is_empty()
            && self.utm_content.is_empty()
            && self.raf_token.is_empty()
            && self.extra_utm.is_empty()
    }
}

/// Query and fragment parameters of a landing URL
struct LandingParams {
    query: Params,
    fragment: Params,
}

impl LandingParams {
    fn from_url(text: &str) -> Self {
        match Url::parse(text) {
            Ok(url) => Self {
                query: url.query().map(Params::parse).unwrap_or_default(),
                fragment: url.fragment().map(Params::parse).unwrap_or_default(),
            },
            Err(e) => {
                debug!(url = text, error = %e, "Landing URL is not absolute, splitting by hand");
                let parts = UrlParts::split(text);
                Self {
                    query: parts.query_params(),
                    fragment: parts.fragment_params(),
                }
            }
        }
    }

    /// Query value, else fragment value, else empty.
    fn read(&self, key: &str) -> String {
        let value = self.query.lookup(key);
        if value.is_empty() {
            self.fragment.lookup(key)
        } else {
            value
        }
    }

    /// Nonempty `utm_*` pairs without a dedicated field. Query wins over
    /// fragment for the same key.
    fn extra_utm(&self) -> BTreeMap<String, String> {
        let mut extra = BTreeMap::new();
        for params in [&self.fragment, &self.query] {
            for (key, value) in params.iter() {
                let value = value.trim();
                if is_extra_utm_key(key) && !value.is_empty() {
                    extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        extra
    }

    fn raf_token(&self) -> String {
        RAF_KEYS
            .iter()
            .map(|key| self.read(key))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }
}

fn is_extra_utm_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.starts_with("utm_") && !NAMED_UTM_KEYS.contains(&lower.as_str())
}

fn prefer_nonempty(from_url: String, stored: &str) -> String {
    if from_url.is_empty() {
        stored.to_string()
    } else {
        from_url
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Merge the landing URL's attribution with a persisted record.
///
/// Never fails: an unparseable URL is split by hand and a missing referrer
/// becomes the empty string.
pub fn compute_snapshot(page: &PageContext, persisted: &PersistedAttribution) -> AttributionSnapshot {
    let landing = LandingParams::from_url(&page.url);
    let url_source = landing.read("utm_source");
    let mut extra_utm: BTreeMap<String, String> = persisted
        .extra_utm
        .iter()
        .filter(|(key, value)| is_extra_utm_key(key) && !value.trim().is_empty())
        .map(|(key, value)| (key.clone(), value.trim().to_string()))
        .collect();
    extra_utm.extend(landing.extra_utm());

    AttributionSnapshot {
        campaign: prefer_nonempty(landing.read("utm_campaign"), &persisted.utm_campaign),
        medium: prefer_nonempty(landing.read("utm_medium"), &persisted.utm_medium),
        source: prefer_nonempty(url_source.clone(), &persisted.utm_source),
        term: non_empty(prefer_nonempty(
            landing.read("utm_term"),
            &persisted.utm_term,
        )),
        content: non_empty(prefer_nonempty(
            landing.read("utm_content"),
            &persisted.utm_content,
        )),
        referrer: page.referrer.clone().unwrap_or_default(),
        raf_token: non_empty(prefer_nonempty(landing.raf_token(), &persisted.raf_token)),
        url_source,
        extra_utm,
    }
}

/// Reads and upserts the persisted record under one namespaced key
pub struct AttributionStore<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> AttributionStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// The persisted record, or an empty one if storage is unavailable or
    /// holds something unreadable.
    pub fn load(&self) -> PersistedAttribution {
        match self.try_load() {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring persisted attribution");
                PersistedAttribution::default()
            }
        }
    }

    pub fn try_load(&self) -> Result<PersistedAttribution, StorageError> {
        match self.storage.get_item(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(PersistedAttribution::default()),
        }
    }

    pub fn save(&mut self, record: &PersistedAttribution) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)?;
        self.storage.set_item(&self.key, &raw)
    }

    /// Compute the snapshot for `page` and upsert its durable fields.
    ///
    /// Write failures are logged; the snapshot is returned regardless.
    pub fn compute(&mut self, page: &PageContext) -> AttributionSnapshot {
        let persisted = self.load();
        let snapshot = compute_snapshot(page, &persisted);
        let record = snapshot.durable();

        if !record.is_empty() {
            if let Err(e) = self.save(&record) {
                warn!(key = %self.key, error = %e, "Failed to persist attribution");
            } else {
                debug!(key = %self.key, "Persisted attribution");
            }
        }

        snapshot
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
