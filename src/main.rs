//! Draft Autosave driver
//!
//! Feeds drafts into an autosave engine from the command line:
//! - Every stdin line holding a JSON draft counts as one edit
//! - `:flush` saves immediately, `:forget` drops the server identity
//! - On EOF or Ctrl-C the latest draft is flushed before exiting

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use draft_autosave::{
    AutosaveConfig, AutosaveEngine, AutosaveEvent, BackendConfig, CheckpointConfig, Draft,
    DraftTarget, HttpBackend, ResourceKind, SledCheckpointStore,
};

/// Upper bound on waiting for the final flush to land
const FINAL_SAVE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// INPUT
// ============================================================================

/// One line of driver input
enum Input {
    Draft(Box<Draft>),
    Flush,
    Forget,
}

fn parse_line(line: &str) -> Result<Option<Input>> {
    let line = line.trim();
    match line {
        "" => Ok(None),
        ":flush" => Ok(Some(Input::Flush)),
        ":forget" => Ok(Some(Input::Forget)),
        json => {
            let draft: Draft = serde_json::from_str(json).context("Invalid draft JSON")?;
            Ok(Some(Input::Draft(Box::new(draft))))
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

fn log_event(event: &AutosaveEvent) {
    match event {
        AutosaveEvent::Saved { id, mode, at } => {
            info!("Saved draft {} ({}) at {}", id, mode, at.to_rfc3339())
        }
        AutosaveEvent::SaveFailed { message, status } => match status {
            Some(status) => warn!("Autosave failed with {}: {}", status, message),
            None => warn!("Autosave failed: {}", message),
        },
        AutosaveEvent::IdentityReset { stale } => {
            warn!("Remote draft {} disappeared, will create a new one", stale)
        }
        AutosaveEvent::Skipped { reason } => info!("Autosave skipped: {:?}", reason),
    }
}

async fn log_events(mut events: broadcast::Receiver<AutosaveEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} autosave events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Force a final save and wait for its outcome
async fn flush_and_wait(engine: &AutosaveEngine) {
    let mut events = engine.subscribe();
    engine.flush();

    match tokio::time::timeout(FINAL_SAVE_TIMEOUT, events.recv()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Event stream ended before the final save: {}", e),
        Err(_) => warn!("Final save did not finish within {:?}", FINAL_SAVE_TIMEOUT),
    }
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "draft_autosave=info".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let kind: ResourceKind = std::env::var("AUTOSAVE_TARGET")
        .unwrap_or_else(|_| "post".to_string())
        .parse()
        .map_err(anyhow::Error::msg)?;

    let config = AutosaveConfig::from_env()?;
    let backend = HttpBackend::new(BackendConfig::from_env()?)?;

    let checkpoint_config = CheckpointConfig::from_env();
    info!("Opening checkpoint store at: {}", checkpoint_config.path);
    let checkpoints =
        SledCheckpointStore::open(checkpoint_config).context("Failed to open checkpoint store")?;

    let engine = AutosaveEngine::spawn(
        DraftTarget::for_kind(kind),
        config,
        Arc::new(backend),
        Arc::new(checkpoints),
    );
    if let Some(id) = engine.identity() {
        info!("Resuming {} draft {}", kind, id);
    }

    let logger = tokio::spawn(log_events(engine.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, saving latest draft");
                break;
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };

        let Some(line) = line else {
            info!("End of input, saving latest draft");
            break;
        };

        match parse_line(&line) {
            Ok(Some(Input::Draft(draft))) => engine.notify_changed(*draft),
            Ok(Some(Input::Flush)) => engine.flush(),
            Ok(Some(Input::Forget)) => {
                info!("Forgetting {} draft", kind);
                engine.forget();
            }
            Ok(None) => {}
            Err(e) => error!("{:#}", e),
        }
    }

    flush_and_wait(&engine).await;
    engine.shutdown().await;
    logger.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_line(":flush"), Ok(Some(Input::Flush))));
        assert!(matches!(parse_line("  :forget "), Ok(Some(Input::Forget))));
        assert!(matches!(parse_line("   "), Ok(None)));
    }

    #[test]
    fn test_parse_partial_draft() {
        match parse_line(r#"{"title":"Trip to Kyoto","content":"Great city"}"#) {
            Ok(Some(Input::Draft(draft))) => {
                assert_eq!(draft.title, "Trip to Kyoto");
                assert_eq!(draft.content, "Great city");
                assert!(draft.tags.is_empty());
            }
            _ => panic!("Expected a draft"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("not json").is_err());
    }
}
