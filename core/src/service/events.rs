use std::sync::Arc;

use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use rpc::LogEvent;

use crate::config::MetricsConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    Login(LogEvent),
}

pub type EventObserver = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Posts events to the SpruceKit metrics API. Delivery is best effort.
#[derive(Clone, Debug)]
pub struct EventLogSink {
    http: reqwest::Client,
    events_url: String,
    api_key: String,
}

impl EventLogSink {
    /// `None` when the API key is blank, which disables logging.
    pub fn new(base_url: &str, api_key: &str) -> Option<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            http: reqwest::Client::new(),
            events_url: format!("{}/events", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &MetricsConfig) -> Option<Self> {
        config
            .api_key
            .as_deref()
            .and_then(|key| Self::new(&config.url, key))
    }

    pub fn events_url(&self) -> &str {
        &self.events_url
    }

    pub async fn send(&self, event: &LogEvent) -> Result<bool, reqwest::Error> {
        let response = self
            .http
            .post(&self.events_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(event)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Send in the background; failures are only logged.
    pub fn dispatch(&self, event: LogEvent) {
        let sink = self.clone();
        tokio::spawn(async move {
            match sink.send(&event).await {
                Ok(true) => debug!("logged {:?} event for {}", event.event_type, event.user_id),
                Ok(false) => warn!("metrics API rejected event for {}", event.user_id),
                Err(err) => warn!("failed to deliver event to {}: {err}", sink.events_url),
            }
        });
    }
}
