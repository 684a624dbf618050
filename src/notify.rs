use crate::error::DeliveryError;
use crate::model::WebhookPayload;
use std::time::Duration;
use tracing::debug;

/// Delivers a composed digest somewhere.
pub trait Notifier {
    fn deliver(&self, payload: &WebhookPayload) -> Result<(), DeliveryError>;
}

pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, DeliveryError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("ghdigest/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn deliver(&self, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        debug!(url = %self.url, channel = %payload.channel, "posting digest");
        let response = self.client.post(&self.url).json(payload).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
