//! `notes watch`: the long-lived notes view.
//!
//! Mounts a [`NotesViewModel`] on the configured backend and redraws
//! whenever its state changes. Commands are read from stdin, one per line:
//!
//! - `add <name> | <details>`: fill the draft and submit it
//! - `name <text>` / `details <text>`: edit the draft
//! - `submit`: submit the current draft
//! - `rm <id>`: delete a note
//! - `reload`: re-run the list query
//! - `quit`
//!
//! Ctrl+C or end of input also quits.

use std::sync::Arc;

use clap::Parser;
use notes_core::NotesBackend;
use notes_core::NotesConfig;
use notes_core::NotesViewModel;
use notes_core::SyncMode;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use crate::client_provider;
use crate::explain;
use crate::render::render_view;

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// How to keep the list current: `reload` or `subscriptions`.
    /// Defaults to the configured sync mode.
    #[arg(long = "mode", short = 'm')]
    pub mode: Option<SyncMode>,
}

/// A parsed line of watch input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    Add { name: String, details: String },
    Name(String),
    Details(String),
    Submit,
    Delete(String),
    Reload,
    Help,
    Quit,
}

impl WatchCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb {
            "add" => {
                let (name, details) = match rest.split_once('|') {
                    Some((name, details)) => (name.trim(), details.trim()),
                    None => (rest, ""),
                };
                Ok(WatchCommand::Add {
                    name: name.to_string(),
                    details: details.to_string(),
                })
            }
            "name" => Ok(WatchCommand::Name(rest.to_string())),
            "details" => Ok(WatchCommand::Details(rest.to_string())),
            "submit" => Ok(WatchCommand::Submit),
            "rm" | "delete" if !rest.is_empty() => Ok(WatchCommand::Delete(rest.to_string())),
            "rm" | "delete" => Err("usage: rm <id>".to_string()),
            "reload" => Ok(WatchCommand::Reload),
            "help" | "?" => Ok(WatchCommand::Help),
            "quit" | "exit" | "q" => Ok(WatchCommand::Quit),
            other => Err(format!("unknown command '{other}' (try 'help')")),
        }
    }
}

const HELP: &str = "commands: add <name> | <details>, name <text>, details <text>, submit, rm <id>, reload, quit";

/// Applies one command. Returns false when the view should close.
fn handle(vm: &mut NotesViewModel, command: WatchCommand) -> bool {
    match command {
        WatchCommand::Add { name, details } => {
            vm.set_draft_name(name);
            vm.set_draft_details(details);
            vm.submit();
        }
        WatchCommand::Name(name) => vm.set_draft_name(name),
        WatchCommand::Details(details) => vm.set_draft_details(details),
        WatchCommand::Submit => {
            vm.submit();
        }
        WatchCommand::Delete(id) => {
            vm.delete(id);
        }
        WatchCommand::Reload => {
            vm.reload();
        }
        WatchCommand::Help => println!("{HELP}"),
        WatchCommand::Quit => return false,
    }
    true
}

fn redraw(vm: &NotesViewModel) {
    println!("{}\n", render_view(vm));
}

pub async fn run_watch(config: NotesConfig, args: WatchArgs) -> anyhow::Result<()> {
    let mode = args.mode.unwrap_or(config.sync_mode);
    let provider = client_provider(config);
    let client = provider.get_client().await.map_err(explain)?;

    let mut vm = NotesViewModel::new(mode);
    let backend: Arc<dyn NotesBackend> = client;
    vm.mount(backend).await;
    redraw(&vm);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            update = vm.next_update() => {
                let Some(update) = update else { break };
                let mut changed = vm.apply(update);
                changed |= vm.drain_pending();
                if changed {
                    redraw(&vm);
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("failed to read input: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match WatchCommand::parse(&line) {
                    Ok(command) => {
                        let draft_before = vm.draft().clone();
                        if !handle(&mut vm, command) {
                            break;
                        }
                        if vm.draft() != &draft_before {
                            redraw(&vm);
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
        }
    }

    // Sends anything still queued before the runtime shuts down.
    vm.unmount().await;
    tracing::info!("watch closed");
    Ok(())
}
