//! Tracker configuration
//!
//! [`RuntimeConfig`] is an immutable value. Re-initialization builds a new
//! one from [`ConfigOverrides`] instead of editing the old one in place.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dom::AttributeSelector;
use crate::error::ConfigError;
use crate::position::PositionAllowList;

pub const DEFAULT_ANALYTICS_ENDPOINT: &str = "https://analyticsnew.overwolf.com/analytics/Counter";
pub const DEFAULT_PAGE_VIEW_EVENT: &str = "page_view_event";
pub const DEFAULT_CTA_CLICK_EVENT: &str = "cta_click_event";
pub const DEFAULT_CTA_ATTRIBUTE: &str = "data-cta";
pub const DEFAULT_POSITION_ATTRIBUTE: &str = "data-position";
pub const DEFAULT_INSTALLER_ATTRIBUTE: &str = "data-installer";
pub const DEFAULT_LAUNCHER_ATTRIBUTE: &str = "data-launcher";
pub const ACTION_URL_ATTRIBUTE: &str = "data-action-url";
pub const DEFAULT_INSTALLER_BASE_URL: &str = "https://download.overwolf.com/install/Download";
pub const SHARED_EXTENSION_ID: &str = "cghphpbjeabdkomiphingnegihoigeggcfphdofo";
pub const DEFAULT_LAUNCHER_BASE_URL: &str = "outplayed-app://promotions-window";
pub const DEFAULT_LAUNCHER_SOURCE: &str = "landing-page";

/// Effective configuration for one tracker instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub page_view_event: String,
    pub cta_click_event: String,
    /// Attribute that opts an element into click tracking
    pub cta_attribute: String,
    /// Full selector for tracked CTAs; empty means `[cta_attribute]`
    pub cta_selector: String,
    pub position_attribute: String,
    pub positions: PositionAllowList,
    pub installer_attribute: String,
    pub launcher_attribute: String,
    /// Collector endpoint; empty means [`DEFAULT_ANALYTICS_ENDPOINT`]
    pub analytics_path: String,
    pub installer_base_url: String,
    pub installer_partner_id: String,
    pub installer_extension_id: String,
    pub installer_utm_term: String,
    pub installer_utm_content: String,
    pub launcher_base_url: String,
    pub launcher_source_fallback: String,
    /// UTM sources forwarded to the launcher as-is; empty forwards any
    pub launcher_sources: Vec<String>,
    pub storage_key: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            page_view_event: DEFAULT_PAGE_VIEW_EVENT.to_string(),
            cta_click_event: DEFAULT_CTA_CLICK_EVENT.to_string(),
            cta_attribute: DEFAULT_CTA_ATTRIBUTE.to_string(),
            cta_selector: String::new(),
            position_attribute: DEFAULT_POSITION_ATTRIBUTE.to_string(),
            positions: PositionAllowList::default(),
            installer_attribute: DEFAULT_INSTALLER_ATTRIBUTE.to_string(),
            launcher_attribute: DEFAULT_LAUNCHER_ATTRIBUTE.to_string(),
            analytics_path: String::new(),
            installer_base_url: DEFAULT_INSTALLER_BASE_URL.to_string(),
            installer_partner_id: String::new(),
            installer_extension_id: SHARED_EXTENSION_ID.to_string(),
            installer_utm_term: String::new(),
            installer_utm_content: String::new(),
            launcher_base_url: DEFAULT_LAUNCHER_BASE_URL.to_string(),
            launcher_source_fallback: DEFAULT_LAUNCHER_SOURCE.to_string(),
            launcher_sources: Vec::new(),
            storage_key: crate::attribution::DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// A new config with every set, nonempty override applied.
    ///
    /// `analytics_path` is the exception: any string replaces it, so an
    /// explicit `""` restores the default collector.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Self {
        Self {
            page_view_event: pick(&overrides.page_view_event, &self.page_view_event),
            cta_click_event: pick(&overrides.cta_click_event, &self.cta_click_event),
            cta_attribute: pick(&overrides.cta_attribute, &self.cta_attribute),
            cta_selector: pick(&overrides.cta_selector, &self.cta_selector),
            position_attribute: pick(&overrides.position_attribute, &self.position_attribute),
            positions: match &overrides.positions {
                Some(positions) if !positions.is_empty() => positions.to_allow_list(),
                _ => self.positions.clone(),
            },
            installer_attribute: pick(&overrides.installer_attribute, &self.installer_attribute),
            launcher_attribute: pick(&overrides.launcher_attribute, &self.launcher_attribute),
            analytics_path: overrides
                .analytics_path
                .clone()
                .unwrap_or_else(|| self.analytics_path.clone()),
            installer_base_url: pick(&overrides.installer_base_url, &self.installer_base_url),
            installer_partner_id: pick(&overrides.installer_partner_id, &self.installer_partner_id),
            installer_extension_id: pick(
                &overrides.installer_extension_id,
                &self.installer_extension_id,
            ),
            installer_utm_term: pick(&overrides.installer_utm_term, &self.installer_utm_term),
            installer_utm_content: pick(
                &overrides.installer_utm_content,
                &self.installer_utm_content,
            ),
            launcher_base_url: pick(&overrides.launcher_base_url, &self.launcher_base_url),
            launcher_source_fallback: pick(
                &overrides.launcher_source_fallback,
                &self.launcher_source_fallback,
            ),
            launcher_sources: match &overrides.launcher_sources {
                Some(sources) => sources.clone(),
                None => self.launcher_sources.clone(),
            },
            storage_key: pick(&overrides.storage_key, &self.storage_key),
        }
    }

    pub fn analytics_endpoint(&self) -> &str {
        if self.analytics_path.is_empty() {
            DEFAULT_ANALYTICS_ENDPOINT
        } else {
            &self.analytics_path
        }
    }

    /// Selector for tracked CTAs. An unparseable `cta_selector` falls back
    /// to `[cta_attribute]`.
    pub fn cta_selector(&self) -> AttributeSelector {
        if self.cta_selector.trim().is_empty() {
            return AttributeSelector::has(self.cta_attribute.clone());
        }
        match self.cta_selector.parse() {
            Ok(selector) => selector,
            Err(e) => {
                warn!(selector = %self.cta_selector, error = %e, "Invalid CTA selector, using attribute");
                AttributeSelector::has(self.cta_attribute.clone())
            }
        }
    }
}

fn pick(overlay: &Option<String>, current: &str) -> String {
    match overlay.as_deref() {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => current.to_string(),
    }
}

/// Positions given either as a list or as the keys of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PositionsOverride {
    List(Vec<String>),
    Keys(BTreeMap<String, serde_json::Value>),
}

impl PositionsOverride {
    pub fn is_empty(&self) -> bool {
        match self {
            PositionsOverride::List(list) => list.is_empty(),
            PositionsOverride::Keys(keys) => keys.is_empty(),
        }
    }

    pub fn to_allow_list(&self) -> PositionAllowList {
        match self {
            PositionsOverride::List(list) => PositionAllowList::new(list),
            PositionsOverride::Keys(keys) => PositionAllowList::from_keys(keys),
        }
    }
}

/// Initialization surface: every field independently optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_click_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<PositionsOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_partner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_extension_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_utm_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_utm_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_source_fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl ConfigOverrides {
    /// Read overrides from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overlay` on top of `base`; a field set in `overlay` wins.
    pub fn merge(base: ConfigOverrides, overlay: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            page_view_event: overlay.page_view_event.or(base.page_view_event),
            cta_click_event: overlay.cta_click_event.or(base.cta_click_event),
            cta_attribute: overlay.cta_attribute.or(base.cta_attribute),
            cta_selector: overlay.cta_selector.or(base.cta_selector),
            position_attribute: overlay.position_attribute.or(base.position_attribute),
            positions: overlay.positions.or(base.positions),
            installer_attribute: overlay.installer_attribute.or(base.installer_attribute),
            launcher_attribute: overlay.launcher_attribute.or(base.launcher_attribute),
            analytics_path: overlay.analytics_path.or(base.analytics_path),
            installer_base_url: overlay.installer_base_url.or(base.installer_base_url),
            installer_partner_id: overlay.installer_partner_id.or(base.installer_partner_id),
            installer_extension_id: overlay
                .installer_extension_id
                .or(base.installer_extension_id),
            installer_utm_term: overlay.installer_utm_term.or(base.installer_utm_term),
            installer_utm_content: overlay.installer_utm_content.or(base.installer_utm_content),
            launcher_base_url: overlay.launcher_base_url.or(base.launcher_base_url),
            launcher_source_fallback: overlay
                .launcher_source_fallback
                .or(base.launcher_source_fallback),
            launcher_sources: overlay.launcher_sources.or(base.launcher_sources),
            storage_key: overlay.storage_key.or(base.storage_key),
        }
    }
}
