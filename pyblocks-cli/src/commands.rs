//! CLI command implementations

use anyhow::{Context, Result};
use pyblocks_common::{ConsoleEntry, ConsoleEvent, ControllerState};
use pyblocks_sandbox::{
    numbered_listing, AppConfig, ClickOutcome, Console, InlineSource, ProcessRuntime,
    ProgramStore, RunController, SourceProvider, CLEAR_CONFIRMATION,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

const HELP: &str = "\
Commands:
  :run     press the run button (stops the program if one is running)
  :stop    stop the running program
  :clear   clear the console
  :show    print the program that :run will execute
  :help    show this help
  :quit    exit
Any other line is submitted to the newest input prompt.
Ctrl-C stops a running program, or exits when idle.";

/// Interactive console: the terminal plays the run button, the input prompts
/// and the output region
pub async fn run_console(config: AppConfig, file: Option<PathBuf>) -> Result<()> {
    let source: Arc<dyn SourceProvider> = match &file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Arc::new(InlineSource::new(text))
        }
        None => Arc::new(ProgramStore::from_config(&config.storage)?),
    };

    let console = Console::new();
    let renderer = tokio::spawn(render(console.subscribe()));
    let controller = Arc::new(RunController::new(
        ProcessRuntime::from_config(&config.worker),
        console.clone(),
        Arc::clone(&source),
    ));

    println!("{}\n", HELP);
    match controller.boot().await {
        Ok(()) => {
            let worker = controller.worker();
            if let Some(session_id) = worker.session_id().await {
                info!(
                    runtime = worker.runtime_name(),
                    session_id = %session_id,
                    "Console ready"
                );
            }
        }
        Err(e) => warn!("Console started without an interpreter: {}", e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                if controller.state().is_active() {
                    spawn_press(&controller, Press::Stop);
                    continue;
                }
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            ":quit" | ":q" => break,
            ":help" => println!("{}", HELP),
            ":run" => spawn_press(&controller, Press::Button),
            ":stop" => spawn_press(&controller, Press::Stop),
            ":show" => match source.current_source() {
                Some(text) => print!("{}", numbered_listing(&text)),
                None => println!("(no program stored yet)"),
            },
            ":clear" => {
                let run_active = controller.state().is_active();
                let answer = if console.needs_clear_confirmation(run_active) {
                    println!("{} [y/N]", CLEAR_CONFIRMATION);
                    let reply = lines.next_line().await.context("Failed to read stdin")?;
                    matches!(
                        reply.as_deref().map(str::trim),
                        Some("y") | Some("Y") | Some("yes")
                    )
                } else {
                    true
                };
                if !controller.clear(&|_: &str| answer) {
                    println!("(console kept)");
                }
            }
            _ => match console.latest_pending_prompt() {
                Some(id) => {
                    console.submit(id, line);
                }
                None => println!("(no program is waiting for input; :help for commands)"),
            },
        }
    }

    if controller.state() != ControllerState::Idle {
        info!("Exiting with a program still running");
    }
    controller.worker().terminate().await;
    renderer.abort();
    Ok(())
}

enum Press {
    Button,
    Stop,
}

fn spawn_press(controller: &Arc<RunController>, press: Press) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let outcome = match press {
            Press::Button => controller.click().await,
            Press::Stop => controller.stop().await,
        };
        if outcome == ClickOutcome::Ignored {
            debug!(state = ?controller.state(), "Button press ignored");
        }
    });
}

async fn render(mut events: broadcast::Receiver<ConsoleEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => render_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Console renderer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_event(event: &ConsoleEvent) {
    let mut out = std::io::stdout().lock();
    let _ = match event {
        ConsoleEvent::Appended(ConsoleEntry::Text(text)) => write!(out, "{}", text),
        ConsoleEvent::Appended(ConsoleEntry::Markup(markup)) => {
            write!(out, "\n{}", markup.to_plain())
        }
        ConsoleEvent::Appended(ConsoleEntry::Prompt(view)) => {
            write!(out, "\n[{}] > ", view.id)
        }
        ConsoleEvent::PromptUpdated(view) if view.value.is_none() && !view.is_interactive() => {
            writeln!(out, "\n[{}] input closed", view.id)
        }
        ConsoleEvent::PromptUpdated(_) => Ok(()),
        ConsoleEvent::Cleared => write!(out, "\x1b[2J\x1b[H"),
        ConsoleEvent::ButtonChanged(view) => writeln!(out, "\n[{}]", view.label),
    };
    let _ = out.flush();
}

/// Store a program under the configured key
pub fn save_program(config: &AppConfig, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let store = ProgramStore::from_config(&config.storage)?;
    store.set(text)?;
    println!(
        "Stored {} as '{}' in {}",
        path.display(),
        store.key(),
        store.path().display()
    );
    Ok(())
}

/// Print the stored program with line numbers
pub fn show_program(config: &AppConfig) -> Result<()> {
    let store = ProgramStore::from_config(&config.storage)?;
    match store.get()? {
        Some(program) => {
            println!("# {} (updated {})", store.key(), program.updated_at);
            print!("{}", numbered_listing(&program.source));
        }
        None => println!("No program stored under '{}'", store.key()),
    }
    Ok(())
}

pub fn show_config(config: &AppConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
