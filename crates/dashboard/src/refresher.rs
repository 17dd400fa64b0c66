use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::timeago;

pub const LAST_UPDATE_ELEMENT_ID: &str = "last-update";
pub const TIMESTAMP_ATTRIBUTE: &str = "data-timestamp";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// A UI element whose text the refresher rewrites.
pub trait StatusElement: Send + Sync {
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_text(&self, text: String);
}

/// Plain in-memory element with attributes and a text body.
#[derive(Debug, Default)]
pub struct StatusLabel {
    id: String,
    attributes: Mutex<HashMap<String, String>>,
    text: Mutex<String>,
}

impl StatusLabel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        if let Ok(mut attributes) = self.attributes.lock() {
            attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Ok(mut attributes) = self.attributes.lock() {
            attributes.remove(name);
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl StatusElement for StatusLabel {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().ok()?.get(name).cloned()
    }

    fn set_text(&self, text: String) {
        if let Ok(mut current) = self.text.lock() {
            *current = text;
        }
    }
}

/// Rewrites an element's text from its timestamp attribute on a fixed interval.
pub struct StatusRefresher {
    element: Option<Arc<dyn StatusElement>>,
    attribute: String,
    interval: Duration,
    locale: String,
    running: Option<(JoinHandle<()>, oneshot::Sender<()>)>,
}

impl StatusRefresher {
    pub fn new(element: Option<Arc<dyn StatusElement>>, locale: impl Into<String>) -> Self {
        Self {
            element,
            attribute: TIMESTAMP_ATTRIBUTE.to_string(),
            interval: DEFAULT_REFRESH_INTERVAL,
            locale: locale.into(),
            running: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Rewrites the element once. Returns `false` when the element or its
    /// timestamp attribute is missing or empty.
    pub fn refresh_once(&self) -> bool {
        refresh_element(self.element.as_deref(), &self.attribute, &self.locale)
    }

    /// Spawns the timer task. The first refresh happens immediately.
    /// Calling `start` on a running refresher does nothing.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Status refresher already running.");
            return;
        }

        let element = self.element.clone();
        let attribute = self.attribute.clone();
        let locale = self.locale.clone();
        let period = self.interval;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        debug!("Status refresher received shutdown signal.");
                        break;
                    }
                    _ = interval.tick() => {
                        refresh_element(element.as_deref(), &attribute, &locale);
                    }
                }
            }
        });

        info!(interval_seconds = period.as_secs(), "Status refresher started.");
        self.running = Some((handle, shutdown_tx));
    }

    /// Stops the timer task and waits for it to finish.
    pub async fn stop(&mut self) {
        let Some((handle, shutdown_tx)) = self.running.take() else {
            return;
        };
        if shutdown_tx.send(()).is_err() {
            warn!("Failed to send shutdown signal to status refresher; it might have already finished.");
        }
        if let Err(e) = handle.await {
            warn!(error = %e, "Status refresher task ended abnormally.");
        }
        info!("Status refresher stopped.");
    }
}

impl Drop for StatusRefresher {
    fn drop(&mut self) {
        if let Some((handle, _)) = self.running.take() {
            handle.abort();
        }
    }
}

fn refresh_element(element: Option<&dyn StatusElement>, attribute: &str, locale: &str) -> bool {
    let Some(element) = element else {
        return false;
    };
    let Some(timestamp) = element.attribute(attribute).filter(|ts| !ts.trim().is_empty()) else {
        return false;
    };
    element.set_text(timeago::format_relative(Some(&timestamp), locale));
    true
}
