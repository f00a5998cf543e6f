use clap::Parser;
use model_poller::{Config, Subscriber, run_until_signal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Download finalized `.zip` objects announced on a Cloud Storage
/// notification subscription and extract them into a local directory.
///
/// Set PUBSUB_EMULATOR_HOST / STORAGE_EMULATOR_HOST to use local emulators and
/// GOOGLE_OAUTH_ACCESS_TOKEN to authenticate against Google Cloud.
#[derive(Parser)]
#[command(name = "model-poller", version)]
struct Args {
    /// The ID of the project that owns the subscription
    project: String,

    /// The ID of the Pub/Sub subscription
    subscription: String,

    /// The directory where models should be saved
    save_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::new(args.project, args.subscription, args.save_dir).with_env_overrides();

    let subscriber = match Subscriber::new(config) {
        Ok(subscriber) => subscriber,
        Err(e) => {
            tracing::error!(error = %e, "failed to start subscriber");
            return ExitCode::FAILURE;
        }
    };

    match run_until_signal(subscriber).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "subscriber stopped with an error");
            ExitCode::FAILURE
        }
    }
}
