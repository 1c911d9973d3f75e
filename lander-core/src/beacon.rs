//! Best-effort analytics beacons
//!
//! A beacon is `GET <endpoint>?Name=<event>&Value=0&Extra=<json>`. Sending
//! is one-way: [`BeaconDispatcher::send`] returns nothing, and neither a
//! serialization failure nor a transport failure is observable to the
//! caller. Failures are logged at debug level and never retried.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use url::form_urlencoded;

use crate::config::DEFAULT_ANALYTICS_ENDPOINT;

/// `Value` is a fixed placeholder, not a measurement.
pub const BEACON_VALUE: &str = "0";

/// A fully formed beacon, as broadcast to local observers before sending
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconPayload {
    pub event_name: String,
    /// Query pairs before form encoding; `Extra` is already percent-encoded
    pub params: Vec<(String, String)>,
    pub url: String,
    pub extra: serde_json::Value,
}

impl BeaconPayload {
    pub fn new(endpoint: &str, event_name: &str, extra: serde_json::Value) -> Self {
        let extra_json = extra.to_string();
        let params = vec![
            ("Name".to_string(), event_name.to_string()),
            ("Value".to_string(), BEACON_VALUE.to_string()),
            (
                "Extra".to_string(),
                urlencoding::encode(&extra_json).into_owned(),
            ),
        ];

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &params {
            serializer.append_pair(key, value);
        }
        let query = serializer.finish();

        let separator = match endpoint.find('?') {
            None => "?",
            Some(_) if endpoint.ends_with('?') || endpoint.ends_with('&') => "",
            Some(_) => "&",
        };

        Self {
            event_name: event_name.to_string(),
            params,
            url: format!("{endpoint}{separator}{query}"),
            extra,
        }
    }
}

/// One-way delivery of a beacon URL
///
/// Implementations must not block and must not report failure.
pub trait BeaconTransport: Send + Sync {
    fn emit(&self, url: &str);
}

/// Fires beacons with `reqwest` on the ambient tokio runtime
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BeaconTransport for HttpTransport {
    fn emit(&self, url: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(url, "No async runtime, dropping beacon");
            return;
        };

        let request = self.client.get(url);
        let url = url.to_string();
        // Detached: nothing awaits this task.
        handle.spawn(async move {
            match request.send().await {
                Ok(response) => debug!(%url, status = %response.status(), "Beacon delivered"),
                Err(e) => debug!(%url, error = %e, "Beacon failed"),
            }
        });
    }
}

/// Records beacon URLs instead of sending them
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs emitted so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.sent().len()
    }
}

impl BeaconTransport for MemoryTransport {
    fn emit(&self, url: &str) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(url.to_string()),
            Err(poisoned) => poisoned.into_inner().push(url.to_string()),
        }
    }
}

/// Formats beacons, tells observers, hands them to the transport
pub struct BeaconDispatcher {
    transport: Arc<dyn BeaconTransport>,
    endpoint: String,
    observers: broadcast::Sender<BeaconPayload>,
}

impl BeaconDispatcher {
    /// Default observer channel capacity.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(transport: Arc<dyn BeaconTransport>) -> Self {
        let (observers, _) = broadcast::channel(Self::DEFAULT_CAPACITY);
        Self {
            transport,
            endpoint: DEFAULT_ANALYTICS_ENDPOINT.to_string(),
            observers,
        }
    }

    /// Use `endpoint` when a send does not name one. Empty keeps the
    /// default collector.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Diagnostic feed of every formed beacon. Lagging receivers miss
    /// events; the dispatcher never waits for them.
    pub fn subscribe(&self) -> broadcast::Receiver<BeaconPayload> {
        self.observers.subscribe()
    }

    /// Send a beacon named `event_name` carrying `extra`.
    ///
    /// `endpoint` overrides the dispatcher's endpoint for this send.
    pub fn send<T: Serialize + ?Sized>(&self, event_name: &str, extra: &T, endpoint: Option<&str>) {
        let extra = match serde_json::to_value(extra) {
            Ok(extra) => extra,
            Err(e) => {
                debug!(event = event_name, error = %e, "Beacon extra is not serializable, dropping");
                return;
            }
        };

        let endpoint = match endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint,
            _ => &self.endpoint,
        };
        let payload = BeaconPayload::new(endpoint, event_name, extra);
        debug!(event = event_name, url = %payload.url, "Sending beacon");

        let url = payload.url.clone();
        // No receivers is fine.
        let _ = self.observers.send(payload);
        self.transport.emit(&url);
    }
}
