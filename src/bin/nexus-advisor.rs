//! Interactive Web3/DeFi advisor for the terminal.
//!
//! This binary provides a streaming REPL on top of the Nexus advisor core.
//!
//! # Usage
//!
//! ```bash
//! # Key from NEXUS_API_KEY or GEMINI_API_KEY, else prompted once
//! nexus-advisor
//!
//! # Use another model and write images to ./nft
//! nexus-advisor --model gemini-2.5-pro --image-dir nft
//!
//! # Disable colors (useful for piping output)
//! nexus-advisor --no-color
//! ```
//!
//! Set `NEXUS_LOG` (e.g. `NEXUS_LOG=nexus=debug`) to see diagnostics on
//! stderr.
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/clear` - Start a new conversation
//! - `/image [1K|2K|4K] <prompt>` - Generate a square image
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use nexus::chat::{
    AdvisorArgs, AdvisorCommand, AdvisorConfig, ConversationSession, Presenter,
    TerminalPresenter, help_text, parse_command,
};
use nexus::persona::IMAGE_FAILURE_MESSAGE;
use nexus::{
    Advisor, Credential, CredentialGate, CredentialStore, EnvCredentialStore, ImagePayload,
    ImageSize,
};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "NEXUS_LOG";

/// Environment first; otherwise ask on the terminal.
struct PromptCredentialStore;

#[async_trait::async_trait]
impl CredentialStore for PromptCredentialStore {
    async fn stored_credential(&self) -> Option<Credential> {
        EnvCredentialStore.stored_credential().await
    }

    async fn request_credential(&self) -> Option<Credential> {
        let answer = tokio::task::spawn_blocking(|| {
            let mut rl = DefaultEditor::new().ok()?;
            println!("No API key found in $NEXUS_API_KEY or $GEMINI_API_KEY.");
            rl.readline("Select API key (Gemini): ").ok()
        })
        .await
        .ok()
        .flatten()?;
        Credential::new(answer)
    }
}

/// Main entry point for the nexus-advisor application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = AdvisorArgs::from_command_line_relaxed("nexus-advisor [OPTIONS]");
    let config = AdvisorConfig::from(args);

    let advisor = Advisor::new(
        Arc::new(config.client()?),
        Arc::new(CredentialGate::new(PromptCredentialStore)),
    );
    let session = advisor.create_session();
    let mut presenter = TerminalPresenter::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Nexus AI Advisor (model: {})", config.text_model);
    println!("Type /help for commands, /quit to exit\n");
    presenter.present(&session.snapshot());

    loop {
        let readline = rl.readline("Você: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        AdvisorCommand::Quit => {
                            println!("Até logo!");
                            break;
                        }
                        AdvisorCommand::Clear => {
                            if session.clear() {
                                presenter.print_info("Conversation cleared.");
                                presenter.present(&session.snapshot());
                            } else {
                                presenter
                                    .print_error("Cannot clear while a reply is in progress.");
                            }
                        }
                        AdvisorCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        AdvisorCommand::Image { size, prompt } => {
                            generate_image(&advisor, &config, &mut presenter, &prompt, size)
                                .await;
                        }
                        AdvisorCommand::Stats => {
                            print_stats(&session, &config);
                        }
                        AdvisorCommand::Invalid(message) => {
                            presenter.print_error(&message);
                        }
                    }
                    continue;
                }

                converse(&session, &mut presenter, line).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nAté logo!");
                break;
            }
            Err(err) => {
                presenter.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    session.close();
    Ok(())
}

/// Send one message and present snapshots until the reply settles.
async fn converse(session: &ConversationSession, presenter: &mut dyn Presenter, line: &str) {
    let mut updates = session.subscribe();
    let Some(reply) = session.send(line) else {
        presenter.print_error("A reply is still in progress.");
        return;
    };

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        presenter.present(&snapshot);
        if !snapshot.is_busy {
            break;
        }
    }
    let outcome = reply.await;
    tracing::debug!(?outcome, "reply settled");
}

async fn generate_image(
    advisor: &Advisor,
    config: &AdvisorConfig,
    presenter: &mut dyn Presenter,
    prompt: &str,
    size: ImageSize,
) {
    presenter.print_info(&format!("Generating {size} image..."));
    let image = match advisor.generate_image(prompt, size).await {
        Ok(image) => image,
        Err(err) => {
            presenter.print_error(&format!("{IMAGE_FAILURE_MESSAGE} ({err})"));
            return;
        }
    };
    match save_image(&image, &config.image_dir) {
        Ok(path) => presenter.print_info(&format!(
            "Image saved to {} ({} character data URI)",
            path.display(),
            image.to_data_uri().len()
        )),
        Err(err) => presenter.print_error(&format!("Failed to save image: {err}")),
    }
}

fn save_image(image: &ImagePayload, dir: &Path) -> nexus::Result<PathBuf> {
    let bytes = image.decode()?;
    std::fs::create_dir_all(dir)
        .map_err(|err| nexus::Error::io("failed to create image directory", err))?;
    let stamp = OffsetDateTime::now_utc().unix_timestamp();
    let path = dir.join(format!("nexus-{stamp}.{}", image.extension()));
    std::fs::write(&path, bytes)
        .map_err(|err| nexus::Error::io("failed to write image file", err))?;
    Ok(path)
}

fn print_stats(session: &ConversationSession, config: &AdvisorConfig) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Text model: {}", config.text_model);
    println!("      Image model: {}", config.image_model);
    println!("      Turns: {} ({} from you)", stats.turn_count, stats.user_turns);
    println!(
        "      Replies: {} completed, {} failed",
        stats.completed_replies, stats.failed_replies
    );
    match config.thinking_budget {
        Some(budget) => println!("      Thinking budget: {budget} tokens"),
        None => println!("      Thinking budget: (disabled)"),
    }
    println!("      Image directory: {}", config.image_dir.display());
}
