//! NATS subscription feeding the ingestion pipeline.

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::info;

use super::{IngestPipeline, IngestStats};
use crate::config::BusConfig;
use crate::error::{ApiError, ApiResult};

/// Connected NATS client plus the subscription settings.
pub struct NatsSubscriber {
    client: async_nats::Client,
    config: BusConfig,
}

impl NatsSubscriber {
    /// Connect to the configured server.
    pub async fn connect(config: &BusConfig) -> ApiResult<Self> {
        let client = async_nats::ConnectOptions::new()
            .name(&config.client_name)
            .connect(config.url.as_str())
            .await
            .map_err(|e| {
                ApiError::service_unavailable(format!(
                    "Failed to connect to NATS at {}: {}",
                    config.url, e
                ))
            })?;

        info!(url = %config.url, client_name = %config.client_name, "Connected to NATS");
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Subscribe to the order subject, joining the queue group if one is set.
    pub async fn subscribe(&self) -> ApiResult<async_nats::Subscriber> {
        let subject = self.config.subject.clone();
        let subscription = match &self.config.queue_group {
            Some(group) => self.client.queue_subscribe(subject, group.clone()).await,
            None => self.client.subscribe(subject).await,
        }
        .map_err(|e| {
            ApiError::service_unavailable(format!(
                "Failed to subscribe to {}: {}",
                self.config.subject, e
            ))
        })?;

        info!(
            subject = %self.config.subject,
            queue_group = ?self.config.queue_group,
            "Subscribed to order subject"
        );
        Ok(subscription)
    }

    /// Subscribe and drive the pipeline on a background task.
    pub async fn spawn(&self, pipeline: IngestPipeline) -> ApiResult<JoinHandle<IngestStats>> {
        let subscription = self.subscribe().await?;
        Ok(tokio::spawn(async move {
            pipeline
                .consume(subscription.map(|message| message.payload))
                .await
        }))
    }
}
