use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_derive::Serialize;

use crate::error::{GatewayError, Result};
use crate::messages::{Event, EventType};

/// What a delivery channel receives for one qualifying event.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub device_id: String,
    pub device_name: String,
    pub event_type: EventType,
    pub date: String,
    pub time: String,
    pub message: String,
}

impl Notification {
    pub fn from_event(event: &Event) -> Self {
        Notification {
            device_id: event.device_id.clone(),
            device_name: event.device_name.clone(),
            event_type: event.event_type,
            date: event.timestamp.format("%Y-%m-%d").to_string(),
            time: event.timestamp.format("%H:%M:%S").to_string(),
            message: event.message.clone(),
        }
    }
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    content: String,
}

/// Posts notifications to a Discord-compatible webhook URL.
pub struct DiscordWebhook {
    url: String,
    client: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| GatewayError::Config(format!("webhook client: {}", err)))?;
        Ok(DiscordWebhook {
            url: url.into(),
            client,
        })
    }

    fn message(notification: &Notification) -> WebhookMessage {
        WebhookMessage {
            content: format!(
                "**ALARM**\n**Device:** {} ({})\n**On:** {}\n**At:** {}\n**Message:** {}",
                notification.device_name,
                notification.device_id,
                notification.date,
                notification.time,
                notification.message
            ),
        }
    }
}

#[async_trait]
impl DeliveryChannel for DiscordWebhook {
    fn name(&self) -> &str {
        "discord"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::message(notification))
            .send()
            .await
            .map_err(|err| GatewayError::Delivery(err.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            code => Err(GatewayError::Delivery(format!("webhook answered {}", code))),
        }
    }
}

/// Forwards alarm events to every configured channel.
#[derive(Default)]
pub struct NotificationRouter {
    channels: Vec<Box<dyn DeliveryChannel>>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl DeliveryChannel + 'static) -> Self {
        info!("Notification channel {} configured", channel.name());
        self.channels.push(Box::new(channel));
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn should_notify(event: &Event) -> bool {
        event.event_type.is_alarm()
    }

    /// Deliver `event` if it qualifies. Returns the per-channel result; empty when filtered out.
    pub async fn route(&self, event: &Event) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        if !Self::should_notify(event) {
            return results;
        }

        let notification = Notification::from_event(event);
        for channel in &self.channels {
            let delivered = match channel.deliver(&notification).await {
                Ok(()) => {
                    debug!("{} notification sent for {}", channel.name(), event.device_id);
                    true
                }
                Err(err) => {
                    warn!("{} notification failed: {}", channel.name(), err);
                    false
                }
            };
            results.insert(channel.name().to_string(), delivered);
        }
        results
    }
}
