//! # model-poller
//!
//! Watches a Cloud Storage bucket through its Pub/Sub notifications and keeps
//! a local directory populated with the contents of every `.zip` archive
//! uploaded to it.
//!
//! For each notification the [`EventHandler`] builds a description of the
//! event. When a `.zip` object is finalized and the notification carries the
//! `JSON_API_V1` payload, the archive is downloaded, extracted into the save
//! directory, and the downloaded file is removed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use model_poller::{Config, Subscriber, run_until_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("my-project", "model_subscription", "/srv/models")
//!         .with_env_overrides();
//!     let subscriber = Subscriber::new(config)?;
//!
//!     // Observe progress
//!     let mut events = subscriber.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     run_until_signal(subscriber).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Single-notification processing
pub mod handler;
/// Pub/Sub REST client
pub mod pubsub;
/// Cloud Storage downloads
pub mod storage;
/// Subscription loop
pub mod subscriber;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, PubSubConfig, StorageConfig};
pub use error::{Error, ExtractionError, Result};
pub use handler::EventHandler;
pub use storage::{GcsClient, ObjectDownloader};
pub use subscriber::Subscriber;
pub use types::{Event, EventType, Notification, ObjectMetadata, PayloadFormat};

use tokio_util::sync::CancellationToken;

/// Run the subscriber until a termination signal arrives
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_until_signal(subscriber: Subscriber) -> Result<()> {
    let shutdown = CancellationToken::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    subscriber.run(shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
