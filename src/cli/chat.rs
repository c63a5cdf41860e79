use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::pin::pin;

use crate::config::Config;
use crate::engine::{Engine, EngineEvent, Mode, OllamaProvider};
use crate::runtime::RuntimeManager;

#[derive(Args)]
pub struct ChatArgs {
    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Starting mode: quick, live, deep, or context
    #[arg(long, default_value = "quick")]
    pub mode: Mode,

    /// Session ID to resume
    #[arg(short, long)]
    pub session: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<()> {
    let config = Config::load()?;
    let (mut engine, runtime) = super::build_engine(&config, args.model).await?;

    engine.set_mode(args.mode);

    if let Some(session_id) = args.session {
        match engine.load_chat(&session_id) {
            Ok(messages) => {
                println!(
                    "Resumed session {} ({} messages)\n",
                    &session_id[..8.min(session_id.len())],
                    messages.len()
                );
            }
            Err(e) => {
                eprintln!("Could not resume session: {}. Starting new session.\n", e);
            }
        }
    }

    let embedding_status = if engine.has_embeddings() {
        " | Embeddings: enabled"
    } else {
        ""
    };
    println!(
        "Ferret v{} | Model: {} | Mode: {} | Memory: {} entries{}\n",
        env!("CARGO_PKG_VERSION"),
        engine.model(),
        engine.mode(),
        engine.memory_count(),
        embedding_status,
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("You: ");

        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break; // Ctrl+D
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        // Commands (except /deep, which routes into the engine)
        if input.starts_with('/') && !input.starts_with("/deep") {
            match handle_command(input, &mut engine, &config, &runtime).await {
                Ok(CommandResult::Continue) => continue,
                Ok(CommandResult::Quit) => break,
                Err(e) => {
                    eprintln!("Error: {}\n", e);
                    continue;
                }
            }
        }

        stream_turn(&mut engine, input).await;
    }

    println!("Goodbye!");
    Ok(())
}

/// Run one turn, printing progress lines and streaming the reply.
async fn stream_turn(engine: &mut Engine, input: &str) {
    let mut stdout = io::stdout();
    print!("\nFerret: ");
    let _ = stdout.flush();

    let mut events = pin!(engine.chat_events(input.to_string()));
    while let Some(event) = events.next().await {
        match event {
            EngineEvent::Progress(status) => {
                println!("[{}]", status);
            }
            EngineEvent::Content(chunk) => {
                print!("{}", chunk);
                let _ = stdout.flush();
            }
            EngineEvent::Done => {}
        }
    }

    println!("\n");
}

enum CommandResult {
    Continue,
    Quit,
}

async fn handle_command(
    input: &str,
    engine: &mut Engine,
    config: &Config,
    runtime: &RuntimeManager,
) -> Result<CommandResult> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    match parts[0] {
        "/help" => {
            println!(
                "\nAvailable commands:\n\
                 \x20 /mode [name]      Show or switch mode (quick, live, deep, context)\n\
                 \x20 /new              Start a new session\n\
                 \x20 /sessions         List saved sessions\n\
                 \x20 /load <id>        Load a session by ID\n\
                 \x20 /delete <id>      Delete a session\n\
                 \x20 /models           List installed models\n\
                 \x20 /model [name]     Show or switch the active model\n\
                 \x20 /wipe-memory      Delete all long-term memories\n\
                 \x20 /deep <question>  One-off deep research run\n\
                 \x20 /quit             Exit\n"
            );
        }
        "/mode" => {
            if let Some(name) = parts.get(1) {
                let mode: Mode = name.parse()?;
                engine.set_mode(mode);
                println!("\nMode switched to **{}**.\n", mode.as_str().to_uppercase());
            } else {
                println!("\nCurrent mode: {}", engine.mode());
                for mode in Mode::ALL {
                    println!("  {:8} {}", mode.as_str(), mode.description());
                }
                println!();
            }
        }
        "/new" => {
            let id = engine.new_chat()?;
            println!("\nStarted new session: {}\n", &id[..8]);
        }
        "/sessions" => {
            let sessions = engine.list_sessions()?;
            if sessions.is_empty() {
                println!("\nNo saved sessions.\n");
            } else {
                println!();
                for session in sessions {
                    println!(
                        "  {}  {}  {}",
                        &session.id[..8],
                        session.created_at,
                        session.title
                    );
                }
                println!();
            }
        }
        "/load" => {
            let id = resolve_session_id(engine, parts.get(1).copied())?;
            let messages = engine.load_chat(&id)?;
            println!("\nLoaded session {} ({} messages)\n", &id[..8], messages.len());
            for msg in messages {
                println!("{}: {}\n", msg.role, msg.content);
            }
        }
        "/delete" => {
            let id = resolve_session_id(engine, parts.get(1).copied())?;
            engine.delete_session(&id)?;
            println!("\nChat deleted.\n");
        }
        "/models" => {
            let models = runtime.list_models().await?;
            if models.is_empty() {
                println!("\nNo models installed.\n");
            } else {
                println!();
                for model in models {
                    let marker = if model == engine.model() { "*" } else { " " };
                    println!("  {} {}", marker, model);
                }
                println!();
            }
        }
        "/model" => {
            if let Some(name) = parts.get(1) {
                engine.replace_provider(Box::new(OllamaProvider::new(
                    runtime.endpoint(),
                    name,
                    config.engine.temperature,
                )));
                println!("\nModel switched to: {}\n", name);
            } else {
                println!("\nActive model: {}\n", engine.model());
            }
        }
        "/wipe-memory" => {
            engine.wipe_memory()?;
            println!("\nMemory completely wiped.\n");
        }
        "/quit" | "/exit" => return Ok(CommandResult::Quit),
        other => {
            eprintln!("Unknown command: {} (try /help)\n", other);
        }
    }

    Ok(CommandResult::Continue)
}

/// Accept a full session id or a unique prefix.
fn resolve_session_id(engine: &Engine, arg: Option<&str>) -> Result<String> {
    let prefix = arg.ok_or_else(|| anyhow::anyhow!("Missing session id (see /sessions)"))?;

    let sessions = engine.list_sessions()?;
    let matches: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.starts_with(prefix))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("No session matches '{}'", prefix),
        1 => Ok(matches[0].id.clone()),
        n => anyhow::bail!("'{}' is ambiguous ({} sessions match)", prefix, n),
    }
}
