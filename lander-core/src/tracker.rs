//! One page load, end to end
//!
//! [`Tracker`] owns the attribution snapshot, the position resolver, the
//! click router and the beacon dispatcher for a single page. The snapshot
//! is computed once in [`Tracker::new`]; re-initialization swaps the config
//! and rebinds, it does not recompute attribution.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::action;
use crate::attribution::{AttributionSnapshot, AttributionStore, PageContext};
use crate::beacon::{BeaconDispatcher, BeaconPayload, BeaconTransport};
use crate::config::{ConfigOverrides, RuntimeConfig};
use crate::dom::{self, AttributeSelector, Document, ReadyState};
use crate::position::PositionResolver;
use crate::router::{ActionAssignment, ClickContext, ClickOutcome, ClickRouter};
use crate::storage::KeyValueStorage;

/// Count of elements a link pass touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub installer: usize,
    pub launcher: usize,
    /// Set when the document was still loading and the pass was postponed
    pub deferred: bool,
}

/// Attribution and CTA tracking for a single page
pub struct Tracker<N> {
    config: RuntimeConfig,
    snapshot: AttributionSnapshot,
    positions: PositionResolver,
    dispatcher: BeaconDispatcher,
    router: ClickRouter<N>,
    links_pending: bool,
}

impl<N: Copy + Eq + std::hash::Hash + std::fmt::Debug> Tracker<N> {
    /// Compute attribution for `page` and persist it through `storage`.
    pub fn new<S: KeyValueStorage>(
        config: RuntimeConfig,
        page: &PageContext,
        storage: S,
        transport: Arc<dyn BeaconTransport>,
    ) -> Self {
        let mut store = AttributionStore::with_key(storage, config.storage_key.clone());
        let snapshot = store.compute(page);
        debug!(
            campaign = %snapshot.campaign,
            source = %snapshot.source,
            medium = %snapshot.medium,
            "Computed attribution"
        );

        Self {
            positions: resolver_for(&config),
            dispatcher: BeaconDispatcher::new(transport).with_endpoint(config.analytics_endpoint()),
            snapshot,
            config,
            router: ClickRouter::new(),
            links_pending: false,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &AttributionSnapshot {
        &self.snapshot
    }

    pub fn positions(&self) -> &PositionResolver {
        &self.positions
    }

    pub fn router(&self) -> &ClickRouter<N> {
        &self.router
    }

    pub fn dispatcher(&self) -> &BeaconDispatcher {
        &self.dispatcher
    }

    /// Every beacon this tracker forms, as it is sent.
    pub fn subscribe(&self) -> broadcast::Receiver<BeaconPayload> {
        self.dispatcher.subscribe()
    }

    /// Bind click tracking and apply installer/launcher links, postponing
    /// the links while the document is still loading.
    pub fn init<D>(&mut self, document: &mut D) -> LinkReport
    where
        D: Document<Node = N> + ?Sized,
    {
        let selector = self.config.cta_selector();
        self.router.bind(selector);

        if document.ready_state() == ReadyState::Loading {
            debug!("Document still loading, deferring link pass");
            self.links_pending = true;
            return LinkReport {
                deferred: true,
                ..Default::default()
            };
        }
        self.apply_links(document)
    }

    /// Run a link pass postponed by [`Tracker::init`]. A no-op otherwise.
    pub fn dom_content_loaded<D>(&mut self, document: &mut D) -> LinkReport
    where
        D: Document<Node = N> + ?Sized,
    {
        if !std::mem::take(&mut self.links_pending) {
            return LinkReport::default();
        }
        self.apply_links(document)
    }

    /// Send the page view beacon.
    pub fn page_loaded(&self) {
        self.dispatcher.send(
            &self.config.page_view_event,
            &self.snapshot,
            Some(self.config.analytics_endpoint()),
        );
    }

    /// Replace the config with `overrides` applied and run init again.
    pub fn reinit<D>(&mut self, document: &mut D, overrides: &ConfigOverrides) -> LinkReport
    where
        D: Document<Node = N> + ?Sized,
    {
        self.config = self.config.with_overrides(overrides);
        self.positions = resolver_for(&self.config);
        let cleared = self.router.clear_actions();
        info!(
            selector = %self.config.cta_selector(),
            cleared_actions = cleared,
            "Re-initialized tracker"
        );
        self.init(document)
    }

    /// Route a click on `target`.
    pub fn click<D>(&self, document: &D, target: N) -> ClickOutcome<N>
    where
        D: Document<Node = N> + ?Sized,
    {
        let context = ClickContext {
            attribution: &self.snapshot,
            positions: &self.positions,
            dispatcher: &self.dispatcher,
            event_name: &self.config.cta_click_event,
            endpoint: Some(self.config.analytics_endpoint()),
        };
        self.router.handle_click(document, target, &context)
    }

    fn apply_links<D>(&mut self, document: &mut D) -> LinkReport
    where
        D: Document<Node = N> + ?Sized,
    {
        let mut report = LinkReport::default();

        if let Some(url) = action::installer_url(&self.config, &self.snapshot) {
            let selector = AttributeSelector::has(self.config.installer_attribute.clone());
            report.installer = self.assign_all(document, &selector, &url);
        }
        if let Some(url) = action::launcher_url(&self.config, &self.snapshot) {
            let selector = AttributeSelector::has(self.config.launcher_attribute.clone());
            report.launcher = self.assign_all(document, &selector, &url);
        }

        debug!(
            installer = report.installer,
            launcher = report.launcher,
            "Applied action links"
        );
        report
    }

    fn assign_all<D>(&mut self, document: &mut D, selector: &AttributeSelector, url: &str) -> usize
    where
        D: Document<Node = N> + ?Sized,
    {
        dom::query_all(document, selector)
            .into_iter()
            .filter(|node| self.router.assign_action(document, *node, url) != ActionAssignment::Skipped)
            .count()
    }
}

fn resolver_for(config: &RuntimeConfig) -> PositionResolver {
    PositionResolver::new(config.position_attribute.clone(), config.positions.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::MemoryTransport;
    use crate::config::ACTION_URL_ATTRIBUTE;
    use crate::dom::{MemoryDocument, NodeId};
    use crate::params::UrlParts;
    use crate::storage::MemoryStorage;

    const LANDING: &str = "https://lp.test/?utm_campaign=bf&utm_source=google&utm_medium=cpc";

    fn partner_config() -> RuntimeConfig {
        RuntimeConfig::default().with_overrides(&ConfigOverrides {
            installer_partner_id: Some("4523".into()),
            ..Default::default()
        })
    }

    fn tracker(config: RuntimeConfig) -> (Tracker<NodeId>, MemoryTransport) {
        let transport = MemoryTransport::new();
        let tracker = Tracker::new(
            config,
            &PageContext::new(LANDING).with_referrer("https://search.test/"),
            MemoryStorage::new(),
            Arc::new(transport.clone()),
        );
        (tracker, transport)
    }

    fn extra_of(url: &str) -> serde_json::Value {
        let extra = UrlParts::split(url).query_params().lookup("Extra");
        serde_json::from_str(&urlencoding::decode(&extra).unwrap()).unwrap()
    }

    #[test]
    fn new_computes_snapshot_once() {
        let (tracker, transport) = tracker(RuntimeConfig::default());
        assert_eq!(tracker.snapshot().campaign, "bf");
        assert_eq!(tracker.snapshot().referrer, "https://search.test/");
        assert_eq!(transport.count(), 0);
    }

    #[test]
    fn page_loaded_sends_page_view() {
        let (tracker, transport) = tracker(RuntimeConfig::default());
        tracker.page_loaded();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let query = UrlParts::split(&sent[0]).query_params();
        assert_eq!(query.get("Name"), Some("page_view_event"));
        let extra = extra_of(&sent[0]);
        assert_eq!(extra["campaign"], "bf");
        assert_eq!(extra["referral"], "https://search.test/");
        assert!(extra.get("button-position").is_none());
    }

    #[test]
    fn init_applies_installer_and_launcher_links() {
        let (mut tracker, _) = tracker(partner_config());
        let mut doc = MemoryDocument::new();
        let download = doc.append_with(doc.root(), "a", &[("data-installer", "")]);
        let launch = doc.append_with(doc.root(), "button", &[("data-launcher", "")]);

        let report = tracker.init(&mut doc);
        assert_eq!(report.installer, 1);
        assert_eq!(report.launcher, 1);

        let href = doc.attribute(download, "href").unwrap();
        let query = UrlParts::split(&href).query_params();
        assert_eq!(query.get("PartnerId"), Some("4523"));
        assert_eq!(query.get("utm_campaign"), Some("bf"));

        let action = doc.attribute(launch, ACTION_URL_ATTRIBUTE).unwrap();
        assert_eq!(action, "outplayed-app://promotions-window?source=google");
        assert_eq!(tracker.router().action_for(launch), Some(action.as_str()));
    }

    #[test]
    fn installer_link_withheld_without_partner() {
        let (mut tracker, _) = tracker(RuntimeConfig::default());
        let mut doc = MemoryDocument::new();
        let download = doc.append_with(doc.root(), "a", &[("data-installer", "")]);

        let report = tracker.init(&mut doc);
        assert_eq!(report.installer, 0);
        assert_eq!(doc.attribute(download, "href"), None);
    }

    #[test]
    fn loading_document_defers_links() {
        let (mut tracker, _) = tracker(partner_config());
        let mut doc = MemoryDocument::new();
        doc.set_ready_state(ReadyState::Loading);
        let download = doc.append_with(doc.root(), "a", &[("data-installer", "")]);

        assert!(tracker.init(&mut doc).deferred);
        assert_eq!(doc.attribute(download, "href"), None);

        doc.set_ready_state(ReadyState::Interactive);
        assert_eq!(tracker.dom_content_loaded(&mut doc).installer, 1);
        assert!(doc.attribute(download, "href").is_some());

        // Second notification has nothing left to do.
        assert_eq!(tracker.dom_content_loaded(&mut doc), LinkReport::default());
    }

    #[test]
    fn click_sends_cta_beacon_with_position() {
        let (mut tracker, transport) = tracker(RuntimeConfig::default());
        let mut doc = MemoryDocument::new();
        let header = doc.append_with(doc.root(), "header", &[("data-position", "header")]);
        let cta = doc.append_with(header, "button", &[("data-cta", "")]);

        tracker.init(&mut doc);
        let outcome = tracker.click(&doc, cta);
        assert!(outcome.beacon_sent());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let query = UrlParts::split(&sent[0]).query_params();
        assert_eq!(query.get("Name"), Some("cta_click_event"));
        assert_eq!(extra_of(&sent[0])["button-position"], "HEADER");
    }

    #[test]
    fn reinit_rebinds_without_duplicating() {
        let (mut tracker, transport) = tracker(RuntimeConfig::default());
        let mut doc = MemoryDocument::new();
        let cta = doc.append_with(doc.root(), "button", &[("data-cta", "")]);

        tracker.init(&mut doc);
        tracker.reinit(&mut doc, &ConfigOverrides::default());
        tracker.click(&doc, cta);
        assert_eq!(transport.count(), 1);
        assert_eq!(tracker.router().listener_count(), 1);
    }

    #[test]
    fn reinit_switches_cta_attribute_and_event() {
        let (mut tracker, transport) = tracker(RuntimeConfig::default());
        let mut doc = MemoryDocument::new();
        let old = doc.append_with(doc.root(), "button", &[("data-cta", "")]);
        let new = doc.append_with(doc.root(), "button", &[("data-track", "")]);

        tracker.init(&mut doc);
        tracker.reinit(
            &mut doc,
            &ConfigOverrides {
                cta_attribute: Some("data-track".into()),
                cta_click_event: Some("lp_click".into()),
                ..Default::default()
            },
        );

        assert!(!tracker.click(&doc, old).beacon_sent());
        assert!(tracker.click(&doc, new).beacon_sent());
        let query = UrlParts::split(&transport.sent()[0]).query_params();
        assert_eq!(query.get("Name"), Some("lp_click"));
    }

    #[test]
    fn reinit_drops_bindings_of_renamed_attribute() {
        let (mut tracker, _) = tracker(RuntimeConfig::default());
        let mut doc = MemoryDocument::new();
        let old = doc.append_with(doc.root(), "button", &[("data-launcher", "")]);
        let new = doc.append_with(doc.root(), "button", &[("data-app", "")]);

        tracker.init(&mut doc);
        assert!(tracker.router().action_for(old).is_some());

        tracker.reinit(
            &mut doc,
            &ConfigOverrides {
                launcher_attribute: Some("data-app".into()),
                ..Default::default()
            },
        );
        assert_eq!(tracker.router().action_for(old), None);
        assert!(tracker.router().action_for(new).is_some());
        assert_eq!(tracker.router().action_count(), 1);
        assert!(tracker.click(&doc, old).navigate_to.is_none());
    }

    #[test]
    fn reinit_keeps_snapshot() {
        let (mut tracker, _) = tracker(RuntimeConfig::default());
        let before = tracker.snapshot().clone();
        let mut doc = MemoryDocument::new();
        tracker.reinit(&mut doc, &ConfigOverrides::default());
        assert_eq!(tracker.snapshot(), &before);
    }

    #[test]
    fn custom_analytics_path_is_used() {
        let config = RuntimeConfig::default().with_overrides(&ConfigOverrides {
            analytics_path: Some("https://collector.test/c".into()),
            ..Default::default()
        });
        let (tracker, transport) = tracker(config);
        tracker.page_loaded();
        assert!(transport.sent()[0].starts_with("https://collector.test/c?"));
    }

    #[test]
    fn subscribers_see_page_view() {
        let (tracker, _) = tracker(RuntimeConfig::default());
        let mut rx = tracker.subscribe();
        tracker.page_loaded();
        assert_eq!(rx.try_recv().unwrap().event_name, "page_view_event");
    }
}
