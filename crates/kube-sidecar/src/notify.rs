//! Reload webhooks called after a successful publish.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;

/// Maximum length of a webhook response body echoed to the log.
const MAX_LOGGED_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

/// Tells a consumer that new output is available.
///
/// Failures are logged by the implementation and never reported back.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str);
}

/// Plain GET per URL with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str) {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Reload {} failed: {}", url, e);
                return;
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => info!("Reload {} ({}): {}", url, status, truncate_body(&body)),
            Err(e) => warn!("Reload {} ({}): failed to read body: {}", url, status, e),
        }
    }
}

/// Records every notified URL.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    calls: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, url: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
    }
}
