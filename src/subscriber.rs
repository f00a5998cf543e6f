//! Subscription loop
//!
//! A pull task fetches notifications from Pub/Sub and sends them through a
//! bounded channel to a single consumer, which runs the [`EventHandler`] and
//! acknowledges each message once it has been handled. Messages are processed
//! one at a time, in the order they were pulled.
//!
//! # Example
//!
//! ```no_run
//! use model_poller::{Config, Subscriber};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> model_poller::Result<()> {
//! let config = Config::new("my-project", "model_subscription", "/srv/models")
//!     .with_env_overrides();
//! let subscriber = Subscriber::new(config)?;
//!
//! let shutdown = CancellationToken::new();
//! subscriber.run(shutdown).await
//! # }
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::handler::EventHandler;
use crate::pubsub::{PubSubClient, ReceivedMessage};
use crate::storage::{GcsClient, ObjectDownloader};
use crate::types::{ATTR_OBJECT_ID, Event};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pulls notifications and feeds them to the event handler
pub struct Subscriber {
    config: Config,
    client: PubSubClient,
    handler: EventHandler,
}

impl Subscriber {
    /// Create a subscriber that downloads through Cloud Storage
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let downloader = GcsClient::new(&config.storage, config.access_token.clone())?;
        Self::with_downloader(config, Arc::new(downloader))
    }

    /// Create a subscriber with a custom object downloader
    pub fn with_downloader(config: Config, downloader: Arc<dyn ObjectDownloader>) -> Result<Self> {
        config.validate()?;

        let client = PubSubClient::new(
            &config.pubsub,
            config.subscription_path(),
            config.access_token.clone(),
        )?;
        let handler = EventHandler::new(downloader, config.staging_dir.clone());

        Ok(Self {
            config,
            client,
            handler,
        })
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.handler.subscribe()
    }

    /// The handler used for each message
    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    /// Run until `shutdown` is cancelled
    ///
    /// The message being handled when shutdown is requested runs to
    /// completion. Every other pulled message, whether queued in the channel
    /// or still waiting in the pull task, is handed back to Pub/Sub for
    /// redelivery.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(self.config.pubsub.channel_capacity);

        let puller = tokio::spawn(pull_loop(
            self.client.clone(),
            PullSettings {
                max_messages: self.config.pubsub.max_messages,
                idle_wait: self.config.pubsub.idle_wait,
                empty_wait: self.config.pubsub.empty_wait,
            },
            tx,
            shutdown.clone(),
        ));

        info!(
            "Listening for messages on {}",
            self.client.subscription_path()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Some(received) => self.handle_message(received).await,
                    None => break,
                },
            }
        }

        rx.close();
        let mut pending = Vec::new();
        while let Ok(received) = rx.try_recv() {
            pending.push(received.ack_id);
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "returning queued messages to the subscription");
            if let Err(e) = self.client.modify_ack_deadline(&pending, 0).await {
                warn!(error = %e, "failed to return queued messages");
            }
        }

        if let Err(e) = puller.await {
            error!(error = %e, "pull task terminated abnormally");
        }

        info!("Subscriber stopped");
        Ok(())
    }

    /// Handle one pulled message and settle it with Pub/Sub
    async fn handle_message(&self, received: ReceivedMessage) {
        let (ack_id, notification) = received.into_parts();
        let message_id = notification.message_id.clone();

        self.handler.emit(Event::MessageReceived {
            message_id: message_id.clone(),
            object_id: notification.attribute(ATTR_OBJECT_ID).map(str::to_string),
        });

        match self
            .handler
            .process(&notification, &self.config.save_dir)
            .await
        {
            Ok(description) => {
                info!("Received message:\n{}", description);
                self.acknowledge(&ack_id).await;
                self.handler.emit(Event::MessageProcessed {
                    message_id,
                    description,
                });
            }
            Err(e) => {
                let acknowledged = e.is_message_scoped();
                error!(
                    message_id = message_id.as_deref().unwrap_or("-"),
                    error = %e,
                    acknowledged,
                    "failed to process message"
                );
                if acknowledged {
                    self.acknowledge(&ack_id).await;
                } else if let Err(nack_err) = self
                    .client
                    .modify_ack_deadline(std::slice::from_ref(&ack_id), 0)
                    .await
                {
                    warn!(error = %nack_err, "failed to return message for redelivery");
                }
                self.handler.emit(Event::MessageFailed {
                    message_id,
                    error: e.to_string(),
                    acknowledged,
                });
            }
        }
    }

    async fn acknowledge(&self, ack_id: &str) {
        if let Err(e) = self.client.acknowledge(&[ack_id.to_string()]).await {
            warn!(error = %e, "failed to acknowledge message");
        }
    }
}

#[derive(Clone, Copy)]
struct PullSettings {
    max_messages: u32,
    idle_wait: Duration,
    empty_wait: Duration,
}

/// Pull batches and forward every message to the consumer
///
/// Exits when shutdown is requested or the consumer goes away. If the
/// consumer goes away mid-batch, the unsent rest of the batch is nacked.
async fn pull_loop(
    client: PubSubClient,
    settings: PullSettings,
    tx: mpsc::Sender<ReceivedMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let pulled = tokio::select! {
            _ = shutdown.cancelled() => break,
            pulled = client.pull(settings.max_messages) => pulled,
        };

        let wait = match pulled {
            Ok(messages) if messages.is_empty() => settings.empty_wait,
            Ok(messages) => {
                debug!(count = messages.len(), "forwarding pulled messages");
                let mut batch = messages.into_iter();
                while let Some(message) = batch.next() {
                    if let Err(mpsc::error::SendError(unsent)) = tx.send(message).await {
                        let ack_ids: Vec<String> = std::iter::once(unsent)
                            .chain(batch)
                            .map(|m| m.ack_id)
                            .collect();
                        return_unsent(&client, &ack_ids).await;
                        debug!("pull task stopped");
                        return;
                    }
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "pull request failed");
                settings.idle_wait
            }
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    debug!("pull task stopped");
}

/// Hand pulled messages that never reached the consumer back to Pub/Sub
async fn return_unsent(client: &PubSubClient, ack_ids: &[String]) {
    info!(count = ack_ids.len(), "returning unsent messages to the subscription");
    if let Err(e) = client.modify_ack_deadline(ack_ids, 0).await {
        warn!(error = %e, "failed to return unsent messages");
    }
}
