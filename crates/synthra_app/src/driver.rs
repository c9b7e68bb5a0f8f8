use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use synthra_core::EngineState;
use synthra_engine::{
    ensure_state_dir, Background, BackgroundConfig, DirectoryTranscriptSource, LocalStore,
    OpenAiEngineFactory, SummarizeError, SummarizeRequest, SummaryEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::commands::{self, Command, HELP};
use crate::config::AppConfig;

/// Builds the background service and feeds it commands from stdin until `quit` or EOF.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("state directory {}", config.state_dir.display()))?;
    let store = LocalStore::load(&config.state_dir);

    let background = Background::new(
        Arc::new(OpenAiEngineFactory::new(config.openai())),
        Arc::new(DirectoryTranscriptSource::new(config.transcript_dir.clone())),
        store,
        BackgroundConfig {
            lifecycle: config.lifecycle(),
            summarizer: config.summarizer(),
            debounce_window: config.debounce_window(),
            clock: Arc::new(|| Utc::now().to_rfc3339()),
        },
    );
    let printer = tokio::spawn(print_events(background.subscribe()));
    background.start();
    if let Some(interval) = config.health_check_interval() {
        background.start_health_monitor(interval);
    }
    engine_info!(
        "Synthra ready; model {} at {}",
        config.model_id,
        config.base_url
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => apply(&background, command),
            Err(err) => println!("error: {err}"),
        }
    }

    engine_info!("Shutting down");
    background.shutdown();
    printer.abort();
    Ok(())
}

fn apply(background: &Background, command: Command) {
    match command {
        Command::Navigate { tab_id, url, title } => background.navigation(tab_id, url, title),
        Command::Close { tab_id } => background.tab_closed(tab_id),
        Command::Summarize {
            tab_id,
            language,
            tier,
            refresh,
        } => {
            let settings = background.settings();
            let request = SummarizeRequest {
                tab_id,
                language: language.unwrap_or(settings.language),
                tier: tier.unwrap_or(settings.tier),
                refresh,
            };
            let background = background.clone();
            tokio::spawn(async move {
                match background.summarize_tab(request).await {
                    Ok(_) => {}
                    Err(SummarizeError::EngineNotReady) => {
                        println!("tab {tab_id}: queued until the engine is ready")
                    }
                    Err(err) => engine_debug!("Summarize for tab {} ended: {}", tab_id, err),
                }
            });
        }
        Command::Status => {
            let settings = background.settings();
            println!("engine: {}", describe_state(&background.engine_state()));
            println!("pending: {}", background.pending_count());
            println!(
                "language: {}  tier: {}  auto: {}",
                settings.language,
                settings.tier,
                if settings.auto_summarize { "on" } else { "off" }
            );
        }
        Command::History => {
            let history = background.history();
            if history.is_empty() {
                println!("history is empty");
            }
            for entry in history {
                println!(
                    "{}  {}  [{} {}] {}",
                    entry.created_at, entry.content_id, entry.language, entry.tier, entry.title
                );
            }
        }
        Command::Forget { content_id } => match background.forget(&content_id) {
            Ok(true) => println!("removed {content_id}"),
            Ok(false) => println!("{content_id} is not in history"),
            Err(err) => engine_warn!("Failed to persist history: {}", err),
        },
        Command::SetLanguage(language) => report_saved(background.set_language(language)),
        Command::SetAutoSummarize(enabled) => report_saved(background.set_auto_summarize(enabled)),
        Command::SetTier(tier) => report_saved(background.set_tier(tier)),
        Command::Init => background.request_initialization(),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn report_saved(result: Result<(), synthra_engine::PersistError>) {
    if let Err(err) = result {
        engine_warn!("Failed to persist settings: {}", err);
        println!("setting changed but could not be saved: {err}");
    }
}

async fn print_events(mut events: broadcast::Receiver<SummaryEvent>) {
    loop {
        match events.recv().await {
            Ok(SummaryEvent::Completed {
                tab_id,
                title,
                summary,
                cached,
                ..
            }) => {
                let source = if cached { " (cached)" } else { "" };
                println!("== tab {tab_id}: {title}{source}\n{summary}\n");
            }
            Ok(SummaryEvent::Failed { tab_id, message }) => {
                println!("== tab {tab_id}: {message}\n");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                engine_warn!("Event printer lagged; {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub fn describe_state(state: &EngineState) -> String {
    match state {
        EngineState::Initializing { progress, phase } => {
            format!("initializing {:.0}% ({phase})", progress * 100.0)
        }
        EngineState::Error {
            message,
            retry_count,
            max_retries,
            is_retrying,
        } => {
            let next = if *is_retrying {
                "retrying"
            } else {
                "run `init` to retry"
            };
            format!("error after {retry_count}/{max_retries} retries: {message} ({next})")
        }
        other => other.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn describes_each_engine_state() {
        assert_eq!(describe_state(&EngineState::Ready), "ready");
        assert_eq!(
            describe_state(&EngineState::initializing(0.42, "Loading")),
            "initializing 42% (Loading)"
        );
        assert_eq!(
            describe_state(&EngineState::Error {
                message: "model gone".to_string(),
                retry_count: 3,
                max_retries: 3,
                is_retrying: false,
            }),
            "error after 3/3 retries: model gone (run `init` to retry)"
        );
    }
}
