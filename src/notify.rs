//! Notification dispatch. Best-effort by contract: a failed send is logged
//! and never aborts the workflow that triggered it.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::AppConfig;

pub const TEMPLATE_COMPLIANCE_REMINDER: &str = "compliance-reminder";
pub const TEMPLATE_COMPLIANCE_OVERDUE: &str = "compliance-overdue";
pub const TEMPLATE_DOCUMENT_STATUS: &str = "document-status";
pub const TEMPLATE_EMPLOYEE_INVITE: &str = "employee-invite";

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, recipient: &str, template: &str, data: Value) -> Result<()>;
}

/// Posts `{recipient, template, data}` to the configured dispatch endpoint,
/// which owns templating and actual delivery.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, recipient: &str, template: &str, data: Value) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "recipient": recipient,
                "template": template,
                "data": data,
            }))
            .send()
            .await
            .context("notification dispatch request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("notification dispatcher returned {}", response.status());
        }

        Ok(())
    }
}

/// Used when no dispatch endpoint is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, recipient: &str, template: &str, _data: Value) -> Result<()> {
        debug!(recipient, template, "notification dispatch disabled; dropping");
        Ok(())
    }
}

pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.notify_endpoint {
        Some(endpoint) => Arc::new(WebhookNotifier::new(endpoint.clone())),
        None => {
            warn!("NOTIFY_ENDPOINT not set; notifications are disabled");
            Arc::new(NoopNotifier)
        }
    }
}

/// Fire-and-forget helper for handlers: failures are logged, never returned.
pub async fn send_best_effort(
    notifier: &dyn Notifier,
    recipient: &str,
    template: &str,
    data: Value,
) {
    if let Err(err) = notifier.send(recipient, template, data).await {
        warn!(recipient, template, error = %err, "notification send failed");
    }
}
