use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;

use folio_application::{AskOutcome, DocumentSession};
use folio_core::ai::QueryClient;
use folio_core::conversation::{Conversation, ConversationStore};
use folio_core::secret::{SecretStore, mask};
use folio_infrastructure::{ConfigService, FileKeyValueStore, KvConversationStore, KvSecretStore};
use folio_interaction::{GeminiClient, PdfTextExtractor, TextExtractor};

mod logging;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/open".to_string(),
                "/close".to_string(),
                "/conversations".to_string(),
                "/switch".to_string(),
                "/new".to_string(),
                "/delete".to_string(),
                "/key".to_string(),
                "/info".to_string(),
                "/help".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Prints a stored transcript with the same palette as live chat.
fn print_transcript(conversation: &Conversation) {
    for message in &conversation.messages {
        if message.is_user {
            println!("{}", format!("> {}", message.text).green());
        } else {
            for line in message.text.lines() {
                println!("{}", line.bright_blue());
            }
        }
    }
}

/// Reads a PDF from disk, extracts its text and loads it into the session.
async fn open_document(session: &DocumentSession, extractor: &PdfTextExtractor, path_arg: &str) {
    let path = Path::new(path_arg);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("{}", format!("Could not read {}: {}", path_arg, e).red());
            return;
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_arg.to_string());

    let encoded = BASE64_STANDARD.encode(&bytes);
    let extracted = match extractor.extract(&encoded).await {
        Ok(extracted) => extracted,
        Err(e) => {
            println!(
                "{}",
                format!("Could not extract text from {}: {}", file_name, e).red()
            );
            return;
        }
    };

    println!(
        "{}",
        format!("Loaded {} ({} pages)", file_name, extracted.page_count).green()
    );
    if extracted.text.trim().is_empty() {
        println!(
            "{}",
            "No text layer found; chat is disabled for this document.".yellow()
        );
    }

    let location = format!("file://{}", path.display());
    if let Some(conversation) = session
        .load_document(location, file_name, extracted.text)
        .await
    {
        if conversation.messages.len() > 1 {
            println!(
                "{}",
                format!(
                    "Resumed: {} ({} messages)",
                    conversation.title,
                    conversation.messages.len()
                )
                .bright_black()
            );
            print_transcript(&conversation);
        } else {
            println!("{}", format!("Started: {}", conversation.title).bright_black());
            print_transcript(&conversation);
        }
    }
}

async fn show_conversations(session: &DocumentSession) {
    let conversations = session.list_conversations().await;
    if conversations.is_empty() {
        println!(
            "{}",
            "No conversations for the current document.".bright_black()
        );
        return;
    }

    let active_id = session.active_conversation().await.map(|c| c.id);
    for (index, conversation) in conversations.iter().enumerate() {
        let marker = if Some(&conversation.id) == active_id.as_ref() {
            "*"
        } else {
            " "
        };
        let updated = conversation
            .last_updated
            .get(..16)
            .unwrap_or(&conversation.last_updated);
        println!(
            "{}",
            format!(
                "{} {}. {} (updated {})",
                marker,
                index + 1,
                conversation.title,
                updated
            )
            .cyan()
        );
    }
}

/// Maps a 1-based listing position to a conversation id; anything that is
/// not a valid position is treated as an id already.
async fn resolve_conversation_id(session: &DocumentSession, arg: &str) -> String {
    let conversations = session.list_conversations().await;
    match arg.parse::<usize>() {
        Ok(index) if (1..=conversations.len()).contains(&index) => {
            conversations[index - 1].id.clone()
        }
        _ => arg.to_string(),
    }
}

async fn switch_to(session: &DocumentSession, arg: &str) {
    let id = resolve_conversation_id(session, arg).await;
    match session.switch_conversation(&id).await {
        Ok(conversation) => {
            println!(
                "{}",
                format!("Switched to: {}", conversation.title).green()
            );
            print_transcript(&conversation);
        }
        Err(e) => println!("{}", format!("{}", e).red()),
    }
}

async fn start_conversation(session: &DocumentSession) {
    match session.new_conversation().await {
        Some(conversation) => {
            println!("{}", format!("Started: {}", conversation.title).green());
            print_transcript(&conversation);
        }
        None => println!("{}", "Open a PDF first.".yellow()),
    }
}

async fn remove_conversation(session: &DocumentSession, arg: &str) {
    let id = resolve_conversation_id(session, arg).await;
    let known = session.list_conversations().await.iter().any(|c| c.id == id);
    if !known {
        println!("{}", format!("No conversation matches '{}'.", arg).yellow());
        return;
    }

    session.delete_conversation(&id).await;
    println!("{}", "Conversation deleted.".green());
    if let Some(active) = session.active_conversation().await {
        println!("{}", format!("Now on: {}", active.title).bright_black());
    }
}

/// Shows, sets or removes the stored Gemini API key. The key value itself
/// is only ever displayed masked.
async fn manage_key(secret_store: &dyn SecretStore, argument: Option<&str>) {
    match argument {
        None => match secret_store.get().await {
            Ok(Some(key)) => println!("{}", format!("Gemini API key: {}", mask(&key)).cyan()),
            Ok(None) => println!(
                "{}",
                "No Gemini API key set. Use '/key <value>' to set one.".yellow()
            ),
            Err(e) => println!("{}", format!("Could not read the API key: {}", e).red()),
        },
        Some("remove") => match secret_store.remove().await {
            Ok(()) => println!("{}", "Gemini API key removed.".green()),
            Err(e) => println!("{}", format!("Could not remove the API key: {}", e).red()),
        },
        Some(value) => match secret_store.set(value).await {
            Ok(()) => println!("{}", "Gemini API key saved.".green()),
            Err(e) => println!("{}", format!("Could not save the API key: {}", e).red()),
        },
    }
}

async fn show_info(session: &DocumentSession, secret_store: &dyn SecretStore, model: &str) {
    match session.document().await {
        Some(document) => {
            println!(
                "{}",
                format!(
                    "Document: {} ({} chars extracted)",
                    document.file_name,
                    document.text.len()
                )
                .cyan()
            );
            println!("{}", format!("Location: {}", document.location).bright_black());
        }
        None => println!("{}", "No document loaded.".bright_black()),
    }

    match session.active_conversation().await {
        Some(conversation) => println!(
            "{}",
            format!(
                "Conversation: {} ({} messages)",
                conversation.title,
                conversation.messages.len()
            )
            .cyan()
        ),
        None => println!("{}", "No active conversation.".bright_black()),
    }

    let key_state = match secret_store.get().await {
        Ok(Some(key)) => mask(&key),
        Ok(None) => "not set".to_string(),
        Err(_) => "unavailable".to_string(),
    };
    println!("{}", format!("Model: {} (API key: {})", model, key_state).bright_black());
}

fn print_help() {
    println!("{}", "Commands:".bright_yellow());
    println!("  {} - load a PDF and resume its conversation", "/open <path>".cyan());
    println!("  {} - close the current document", "/close".cyan());
    println!("  {} - list conversations for the current document", "/conversations".cyan());
    println!("  {} - switch to another conversation", "/switch <n|id>".cyan());
    println!("  {} - start a fresh conversation", "/new".cyan());
    println!("  {} - delete a conversation", "/delete <n|id>".cyan());
    println!("  {} - show, set or remove the Gemini API key", "/key [value|remove]".cyan());
    println!("  {} - show document, conversation and model status", "/info".cyan());
    println!("  {} - show this help", "/help".cyan());
    println!("  {} - exit Folio", "quit".cyan());
    println!();
    println!("{}", "Anything else is sent as a question about the open PDF.".bright_black());
}

/// The main entry point for the Folio REPL application.
///
/// This async function sets up a rustyline-based REPL that:
/// 1. Initializes the storage, config and AI backend components
/// 2. Sets up an mpsc channel so answers never block the prompt
/// 3. Provides command completion for the slash commands
/// 4. Displays colored output for user, AI, and system messages
#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init()?;
    tracing::info!("[folio-cli] Started");

    // ===== Backend Initialization =====
    let kv_store = Arc::new(FileKeyValueStore::from_default_dir()?);
    let conversation_store: Arc<dyn ConversationStore> =
        Arc::new(KvConversationStore::new(kv_store.clone()));
    let secret_store: Arc<dyn SecretStore> = Arc::new(KvSecretStore::new(kv_store));

    let config = ConfigService::new().get_config();
    let model = config.gemini.model.clone();
    let client: Arc<dyn QueryClient> =
        Arc::new(GeminiClient::new(secret_store.clone(), config.gemini.model));

    let session = Arc::new(DocumentSession::new(conversation_store, client));
    let extractor = PdfTextExtractor;

    // Create a channel for receiving answers from background tasks
    let (response_tx, mut response_rx) = mpsc::channel::<AskOutcome>(32);

    // Spawn response handler task
    let response_handler = tokio::spawn(async move {
        while let Some(outcome) = response_rx.recv().await {
            match outcome {
                AskOutcome::Answered(message) => {
                    for line in message.text.lines() {
                        println!("{}", line.bright_blue());
                    }
                }
                AskOutcome::Busy => {
                    println!(
                        "{}",
                        "Still answering the previous question; give it a moment.".yellow()
                    );
                }
                AskOutcome::Stale => {
                    println!(
                        "{}",
                        "Answer discarded; the conversation changed while it was being written."
                            .bright_black()
                    );
                }
            }
        }
    });

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Folio ===".bright_magenta().bold());
    println!(
        "{}",
        "Chat with a PDF. '/open <path>' to load one, '/help' for commands, 'quit' to exit."
            .bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                // Handle quit command
                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                // Skip empty lines
                if trimmed.is_empty() {
                    continue;
                }

                // Add to history
                let _ = rl.add_history_entry(&line);

                if trimmed.starts_with('/') {
                    let mut parts = trimmed.splitn(2, ' ');
                    let command = parts.next().unwrap_or("");
                    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

                    match command {
                        "/open" => match argument {
                            Some(path) => open_document(&session, &extractor, path).await,
                            None => println!("{}", "Usage: /open <path-to-pdf>".yellow()),
                        },
                        "/close" => {
                            session.clear_document().await;
                            println!("{}", "Document closed.".green());
                        }
                        "/conversations" => show_conversations(&session).await,
                        "/switch" => match argument {
                            Some(arg) => switch_to(&session, arg).await,
                            None => println!("{}", "Usage: /switch <number-or-id>".yellow()),
                        },
                        "/new" => start_conversation(&session).await,
                        "/delete" => match argument {
                            Some(arg) => remove_conversation(&session, arg).await,
                            None => println!("{}", "Usage: /delete <number-or-id>".yellow()),
                        },
                        "/key" => manage_key(secret_store.as_ref(), argument).await,
                        "/info" => show_info(&session, secret_store.as_ref(), &model).await,
                        "/help" => print_help(),
                        _ => println!("{}", "Unknown command; try /help".bright_black()),
                    }
                    continue;
                }

                // Display user input in green
                println!("{}", format!("> {}", trimmed).green());

                // Clone necessary variables for the background question
                let tx = response_tx.clone();
                let question = trimmed.to_string();
                let session = Arc::clone(&session);

                // Spawn background task for the AI interaction; answers come
                // back through the channel so the prompt stays responsive
                tokio::spawn(async move {
                    let outcome = session.ask(&question).await;
                    let _ = tx.send(outcome).await;
                });
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    // Drop the channel to signal shutdown
    drop(response_tx);

    // Wait for the response handler to finish
    let _ = response_handler.await;

    Ok(())
}
