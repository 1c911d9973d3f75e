//! Delegated CTA click routing and per-element action bindings
//!
//! The router holds at most one delegated listener. Binding again always
//! drops the previous listener first, so a page that re-initializes still
//! sends one beacon per click. Action bindings live in an ownership map
//! keyed by element: one synthetic navigation per element.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use tracing::{debug, info};

use crate::attribution::AttributionSnapshot;
use crate::beacon::BeaconDispatcher;
use crate::config::ACTION_URL_ATTRIBUTE;
use crate::dom::{self, AttributeSelector, Document};
use crate::position::{Position, PositionResolver};

/// Identifier of a registered delegated listener
pub type ListenerId = u64;

/// Delegated listener state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouterState {
    #[default]
    Unbound,
    Bound {
        selector: AttributeSelector,
        listener: ListenerId,
    },
}

/// Everything a CTA beacon is assembled from
pub struct ClickContext<'a> {
    pub attribution: &'a AttributionSnapshot,
    pub positions: &'a PositionResolver,
    pub dispatcher: &'a BeaconDispatcher,
    pub event_name: &'a str,
    pub endpoint: Option<&'a str>,
}

/// Extra data of a CTA click beacon
#[derive(Debug, Serialize)]
pub struct CtaClickExtra<'a> {
    #[serde(flatten)]
    pub attribution: &'a AttributionSnapshot,
    #[serde(rename = "button-position")]
    pub button_position: &'a str,
}

/// What a click did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome<N> {
    /// The tracked CTA the click landed in, if any
    pub cta: Option<N>,
    pub position: Position,
    /// Where the host should navigate, for elements with an action binding
    pub navigate_to: Option<String>,
    pub default_prevented: bool,
}

impl<N> Default for ClickOutcome<N> {
    fn default() -> Self {
        Self {
            cta: None,
            position: Position::Unresolved,
            navigate_to: None,
            default_prevented: false,
        }
    }
}

impl<N> ClickOutcome<N> {
    pub fn beacon_sent(&self) -> bool {
        self.cta.is_some()
    }
}

/// How [`ClickRouter::assign_action`] attached a url
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionAssignment {
    /// Empty url, nothing done
    Skipped,
    /// Hyperlink element, `href` set
    Href,
    /// Synthetic navigation binding; `replaced` when one already existed
    Handler { replaced: bool },
}

/// Delegated click router
#[derive(Debug)]
pub struct ClickRouter<N> {
    state: RouterState,
    next_listener: ListenerId,
    actions: HashMap<N, String>,
}

impl<N> Default for ClickRouter<N> {
    fn default() -> Self {
        Self {
            state: RouterState::Unbound,
            next_listener: 0,
            actions: HashMap::new(),
        }
    }
}

impl<N: Copy + Eq + Hash + std::fmt::Debug> ClickRouter<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, RouterState::Bound { .. })
    }

    /// Number of live delegated listeners: zero or one.
    pub fn listener_count(&self) -> usize {
        usize::from(self.is_bound())
    }

    /// Register the delegated listener for `selector`, removing any
    /// previous one first.
    pub fn bind(&mut self, selector: AttributeSelector) -> ListenerId {
        self.unbind();
        self.next_listener += 1;
        let listener = self.next_listener;
        info!(%selector, listener, "Bound CTA click listener");
        self.state = RouterState::Bound { selector, listener };
        listener
    }

    /// Remove the delegated listener. Returns whether one was bound.
    pub fn unbind(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            RouterState::Bound { listener, .. } => {
                debug!(listener, "Removed CTA click listener");
                true
            }
            RouterState::Unbound => false,
        }
    }

    /// Point `element` at `url`.
    ///
    /// Hyperlinks get `href`; anything else gets a navigation binding,
    /// replacing any earlier one, and the url mirrored on
    /// `data-action-url` for inspection.
    pub fn assign_action<D>(&mut self, document: &mut D, element: N, url: &str) -> ActionAssignment
    where
        D: Document<Node = N> + ?Sized,
    {
        if url.is_empty() {
            return ActionAssignment::Skipped;
        }
        if dom::is_hyperlink(document, element) {
            document.set_attribute(element, "href", url);
            return ActionAssignment::Href;
        }

        let replaced = self.actions.insert(element, url.to_string()).is_some();
        if replaced {
            debug!(?element, url, "Replaced action binding");
        }
        document.set_attribute(element, ACTION_URL_ATTRIBUTE, url);
        ActionAssignment::Handler { replaced }
    }

    /// Bound navigation url of `element`, if any.
    pub fn action_for(&self, element: N) -> Option<&str> {
        self.actions.get(&element).map(String::as_str)
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Drop every navigation binding. Hyperlink `href`s already written to
    /// the document are left alone.
    pub fn clear_actions(&mut self) -> usize {
        let cleared = self.actions.len();
        self.actions.clear();
        cleared
    }

    /// Route one click on `target`.
    ///
    /// Sends at most one CTA beacon (through the single delegated listener)
    /// and reports the navigation of the nearest action binding.
    pub fn handle_click<D>(&self, document: &D, target: N, context: &ClickContext<'_>) -> ClickOutcome<N>
    where
        D: Document<Node = N> + ?Sized,
    {
        let mut outcome = ClickOutcome::default();

        if let RouterState::Bound { selector, .. } = &self.state
            && let Some(cta) = dom::closest(document, target, |node| selector.matches(document, node))
        {
            let position = context.positions.resolve(document, cta);
            let extra = CtaClickExtra {
                attribution: context.attribution,
                button_position: position.as_str(),
            };
            context
                .dispatcher
                .send(context.event_name, &extra, context.endpoint);
            outcome.cta = Some(cta);
            outcome.position = position;
        }

        if let Some(bound) = dom::closest(document, target, |node| self.actions.contains_key(&node))
            && let Some(url) = self.actions.get(&bound)
        {
            outcome.navigate_to = Some(url.clone());
            outcome.default_prevented = true;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::beacon::MemoryTransport;
    use crate::dom::{MemoryDocument, NodeId};
    use crate::params::UrlParts;
    use crate::position::PositionAllowList;

    struct Fixture {
        doc: MemoryDocument,
        button: NodeId,
        icon: NodeId,
        plain: NodeId,
        transport: MemoryTransport,
        dispatcher: BeaconDispatcher,
        attribution: AttributionSnapshot,
        positions: PositionResolver,
    }

    impl Fixture {
        fn new() -> Self {
            let mut doc = MemoryDocument::new();
            let section = doc.append_with(doc.root(), "section", &[("data-position", "top")]);
            let button = doc.append_with(section, "button", &[("data-cta", "")]);
            let icon = doc.append(button, "svg");
            let plain = doc.append(section, "p");
            let transport = MemoryTransport::new();
            let dispatcher = BeaconDispatcher::new(Arc::new(transport.clone()));
            Self {
                doc,
                button,
                icon,
                plain,
                transport,
                dispatcher,
                attribution: AttributionSnapshot {
                    campaign: "bf".into(),
                    source: "google".into(),
                    ..Default::default()
                },
                positions: PositionResolver::new("data-position", PositionAllowList::default()),
            }
        }

        fn context(&self) -> ClickContext<'_> {
            ClickContext {
                attribution: &self.attribution,
                positions: &self.positions,
                dispatcher: &self.dispatcher,
                event_name: "cta_click_event",
                endpoint: None,
            }
        }
    }

    #[test]
    fn unbound_router_sends_nothing() {
        let fx = Fixture::new();
        let router = ClickRouter::new();
        let outcome = router.handle_click(&fx.doc, fx.button, &fx.context());
        assert!(!outcome.beacon_sent());
        assert_eq!(fx.transport.count(), 0);
    }

    #[test]
    fn click_inside_cta_sends_one_beacon_with_position() {
        let fx = Fixture::new();
        let mut router = ClickRouter::new();
        router.bind(AttributeSelector::has("data-cta"));

        let outcome = router.handle_click(&fx.doc, fx.icon, &fx.context());
        assert_eq!(outcome.cta, Some(fx.button));
        assert_eq!(outcome.position.as_str(), "TOP");

        let sent = fx.transport.sent();
        assert_eq!(sent.len(), 1);
        let extra = UrlParts::split(&sent[0]).query_params().lookup("Extra");
        let json: serde_json::Value =
            serde_json::from_str(&urlencoding::decode(&extra).unwrap()).unwrap();
        assert_eq!(json["button-position"], "TOP");
        assert_eq!(json["campaign"], "bf");
        assert_eq!(json["referral"], "");
    }

    #[test]
    fn click_outside_cta_sends_nothing() {
        let fx = Fixture::new();
        let mut router = ClickRouter::new();
        router.bind(AttributeSelector::has("data-cta"));
        let outcome = router.handle_click(&fx.doc, fx.plain, &fx.context());
        assert_eq!(outcome.cta, None);
        assert_eq!(fx.transport.count(), 0);
    }

    #[test]
    fn rebinding_same_selector_keeps_one_listener() {
        let fx = Fixture::new();
        let mut router = ClickRouter::new();
        let first = router.bind(AttributeSelector::has("data-cta"));
        let second = router.bind(AttributeSelector::has("data-cta"));
        assert_ne!(first, second);
        assert_eq!(router.listener_count(), 1);

        router.handle_click(&fx.doc, fx.button, &fx.context());
        assert_eq!(fx.transport.count(), 1);
    }

    #[test]
    fn rebinding_switches_selector() {
        let fx = Fixture::new();
        let mut router = ClickRouter::new();
        router.bind(AttributeSelector::has("data-cta"));
        router.bind(AttributeSelector::has("data-track"));

        router.handle_click(&fx.doc, fx.button, &fx.context());
        assert_eq!(fx.transport.count(), 0);
    }

    #[test]
    fn unbind_reports_previous_state() {
        let mut router: ClickRouter<NodeId> = ClickRouter::new();
        assert!(!router.unbind());
        router.bind(AttributeSelector::has("data-cta"));
        assert!(router.unbind());
        assert_eq!(router.state(), &RouterState::Unbound);
    }

    #[test]
    fn assign_action_sets_href_on_links() {
        let mut doc = MemoryDocument::new();
        let link = doc.append(doc.root(), "a");
        let mut router = ClickRouter::new();

        let result = router.assign_action(&mut doc, link, "https://dl.test/x");
        assert_eq!(result, ActionAssignment::Href);
        assert_eq!(doc.attribute(link, "href").as_deref(), Some("https://dl.test/x"));
        assert_eq!(router.action_count(), 0);
    }

    #[test]
    fn assign_action_replaces_handler_on_non_links() {
        let mut doc = MemoryDocument::new();
        let button = doc.append(doc.root(), "button");
        let mut router = ClickRouter::new();

        assert_eq!(
            router.assign_action(&mut doc, button, "app://one"),
            ActionAssignment::Handler { replaced: false }
        );
        assert_eq!(
            router.assign_action(&mut doc, button, "app://two"),
            ActionAssignment::Handler { replaced: true }
        );
        assert_eq!(router.action_count(), 1);
        assert_eq!(router.action_for(button), Some("app://two"));
        assert_eq!(
            doc.attribute(button, ACTION_URL_ATTRIBUTE).as_deref(),
            Some("app://two")
        );
    }

    #[test]
    fn assign_action_skips_empty_url() {
        let mut doc = MemoryDocument::new();
        let button = doc.append(doc.root(), "button");
        let mut router = ClickRouter::new();
        assert_eq!(
            router.assign_action(&mut doc, button, ""),
            ActionAssignment::Skipped
        );
        assert_eq!(doc.attribute(button, ACTION_URL_ATTRIBUTE), None);
    }

    #[test]
    fn clear_actions_drops_bindings() {
        let mut doc = MemoryDocument::new();
        let button = doc.append(doc.root(), "button");
        let mut router = ClickRouter::new();
        router.assign_action(&mut doc, button, "app://go");

        assert_eq!(router.clear_actions(), 1);
        assert_eq!(router.action_for(button), None);
        assert_eq!(router.action_count(), 0);
    }

    #[test]
    fn click_on_bound_element_navigates_once() {
        let mut fx = Fixture::new();
        let mut router = ClickRouter::new();
        router.bind(AttributeSelector::has("data-cta"));
        router.assign_action(&mut fx.doc, fx.button, "app://launch?source=x");

        let outcome = router.handle_click(&fx.doc, fx.icon, &fx.context());
        assert!(outcome.default_prevented);
        assert_eq!(outcome.navigate_to.as_deref(), Some("app://launch?source=x"));
        assert_eq!(fx.transport.count(), 1);
    }
}
