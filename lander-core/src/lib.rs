//! lander-core: Landing page attribution and CTA tracking
//!
//! This crate provides the pieces a marketing landing page needs:
//!
//! - **Attribution** - [`AttributionStore`] merges UTM tags from the landing URL
//!   with what an earlier visit persisted
//! - **Positions** - [`PositionResolver`] classifies a CTA by its nearest
//!   `data-position` ancestor against an allow-list
//! - **Action links** - [`installer_url`] and [`launcher_url`] build the download
//!   and app deep links
//! - **Beacons** - [`BeaconDispatcher`] fires best-effort analytics events
//! - **Click routing** - [`ClickRouter`] sends one CTA beacon per click and owns
//!   per-element navigation bindings
//! - **Page tracker** - [`Tracker`] wires all of the above for one page load
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lander_core::{HttpTransport, MemoryDocument, MemoryStorage, PageContext, RuntimeConfig, Tracker};
//!
//! let page = PageContext::new("https://lp.example/?utm_campaign=launch&utm_source=google");
//! let mut doc = MemoryDocument::new();
//! let cta = doc.append_with(doc.root(), "button", &[("data-cta", "")]);
//!
//! let mut tracker = Tracker::new(
//!     RuntimeConfig::default(),
//!     &page,
//!     MemoryStorage::new(),
//!     Arc::new(HttpTransport::new()),
//! );
//! tracker.init(&mut doc);
//! tracker.page_loaded();
//! tracker.click(&doc, cta);
//! ```
//!
//! # Architecture
//!
//! ```text
//! page load ──► AttributionStore ──► snapshot
//!                                       │
//!     click ──► ClickRouter ──► PositionResolver
//!                    │                  │
//!                    ▼                  ▼
//!            action bindings     BeaconDispatcher ──► BeaconTransport
//! ```

pub mod action;
pub mod attribution;
pub mod beacon;
pub mod config;
pub mod dom;
pub mod error;
pub mod params;
pub mod position;
pub mod router;
pub mod storage;
pub mod tracker;

// Re-export key types for convenience
pub use action::{apply_params, installer_url, launcher_url, to_https};
pub use attribution::{
    AttributionSnapshot, AttributionStore, PageContext, PersistedAttribution, compute_snapshot,
};
pub use beacon::{BeaconDispatcher, BeaconPayload, BeaconTransport, HttpTransport, MemoryTransport};
pub use config::{ConfigOverrides, PositionsOverride, RuntimeConfig};
pub use dom::{AttributeSelector, Document, MemoryDocument, NodeId, ReadyState};
pub use error::{ConfigError, SelectorError, StorageError};
pub use params::{Params, UrlParts};
pub use position::{Position, PositionAllowList, PositionResolver};
pub use router::{ActionAssignment, ClickOutcome, ClickRouter, RouterState};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, UnavailableStorage};
pub use tracker::{LinkReport, Tracker};
