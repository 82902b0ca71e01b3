//! PalletLens application binary - composition root.
//!
//! Ties the PalletLens crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Build the shared OpenAI vision client
//! 3. Load the credential (store, or a per-run override)
//! 4. Run one capture session for the requested command and print the result

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use palletlens_capture::{EncoderLimits, FileBlob, ImageEncoder, SnapshotFileCamera};
use palletlens_core::config::LensConfig;
use palletlens_core::events::SessionEvent;
use palletlens_core::types::{AnalysisResult, SlotId};
use palletlens_inference::OpenAiVisionClient;
use palletlens_session::{CaptureSession, CredentialLifecycle, ImageSource, SessionError};
use tokio::sync::broadcast;

use cli::{CliArgs, Command, KeyAction};

/// Log every domain event at debug level.
fn spawn_event_log(mut events: broadcast::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    tracing::debug!(event = event.name(), %payload, "Session event");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn run_key(
    action: KeyAction,
    lifecycle: &CredentialLifecycle<OpenAiVisionClient>,
    override_present: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = lifecycle
        .store()
        .map(|s| s.path().display().to_string())
        .unwrap_or_default();

    match action {
        KeyAction::Set { value } => {
            if lifecycle.on_credential_change(&value)? {
                println!("Credential saved to {}", store_path);
            } else {
                println!("Credential cleared");
            }
        }
        KeyAction::Clear => {
            lifecycle.on_credential_change("")?;
            println!("Credential cleared");
        }
        KeyAction::Status => {
            let stored = lifecycle.initialize()?;
            match (stored, override_present) {
                (_, true) => println!("configured (override)"),
                (true, false) => println!("configured ({})", store_path),
                (false, false) => println!("not configured"),
            }
        }
    }
    Ok(())
}

/// Process exit status for a finished session run.
///
/// 0 for a description, 1 when the attempt ended in a failure, 2 when the
/// session rejected or discarded the attempt.
fn exit_status(outcome: &Result<AnalysisResult, SessionError>) -> u8 {
    match outcome {
        Ok(result) if result.is_failure() => 1,
        Ok(_) => 0,
        Err(_) => 2,
    }
}

async fn run_session(
    session: CaptureSession<OpenAiVisionClient>,
    source: ImageSource,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let outcome = session.submit(source).await;
    let view = session.view();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        match &outcome {
            Ok(result) => match result.failure() {
                None => println!("{}", result.description().unwrap_or_default()),
                Some(err) => eprintln!("Error: {}", err),
            },
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if let Err(e) = &outcome {
        tracing::warn!(slot = %view.slot, error = %e, "Session did not complete");
    }
    Ok(ExitCode::from(exit_status(&outcome)))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = LensConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }

    // Tracing. RUST_LOG wins over the resolved level.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting PalletLens v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Inference client (single shared instance).
    let client = Arc::new(OpenAiVisionClient::new(config.inference.clone())?);
    tracing::info!(endpoint = %client.endpoint(), model = %config.inference.model, "Vision client ready");

    // Credential.
    let (events, _) = broadcast::channel(64);
    spawn_event_log(events.subscribe());
    let lifecycle =
        CredentialLifecycle::from_config(Arc::clone(&client), &config).with_events(events.clone());
    let override_key = args.resolve_api_key(&config.credential.env_var);
    let detail = args.resolve_detail(config.inference.detail);
    let json = args.json;

    let (slot, source, camera) = match args.command {
        Command::Key { action } => {
            run_key(action, &lifecycle, override_key.is_some())?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Analyze { file } => (
            SlotId::from("problem-form"),
            ImageSource::File(FileBlob::from_path(file)),
            None,
        ),
        Command::Capture { frame } => (
            SlotId::from("analyzer"),
            ImageSource::Camera,
            Some(SnapshotFileCamera::new(frame)),
        ),
    };

    if let Err(e) = lifecycle.initialize() {
        tracing::warn!(error = %e, "Credential store unreadable");
    }
    if let Some(credential) = override_key {
        lifecycle.use_transient(credential);
    }

    let session = CaptureSession::new(slot, Arc::clone(&client))
        .with_encoder(ImageEncoder::new(EncoderLimits::from(&config.capture)))
        .with_detail(detail)
        .with_event_sender(events);
    if let Some(camera) = camera {
        session.attach_camera(Arc::new(camera));
    }

    run_session(session, source, json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use palletlens_core::types::AnalysisError;

    #[test]
    fn test_exit_status() {
        let described: Result<AnalysisResult, SessionError> =
            Ok(AnalysisResult::Description("Pallet intact.".to_string()));
        assert_eq!(exit_status(&described), 0);

        let failed: Result<AnalysisResult, SessionError> =
            Ok(AnalysisError::NotConfigured.into());
        assert_eq!(exit_status(&failed), 1);

        assert_eq!(exit_status(&Err(SessionError::Superseded)), 2);
        assert_eq!(exit_status(&Err(SessionError::AcquisitionPending)), 2);
    }
}
