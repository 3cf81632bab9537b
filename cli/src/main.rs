use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use notes_cli::load_config;
use notes_cli::notes_cmd;
use notes_cli::notes_cmd::AddArgs;
use notes_cli::notes_cmd::DeleteArgs;
use notes_cli::notes_cmd::ListArgs;
use notes_cli::resolve_notes_home;
use notes_cli::session_cmd;
use notes_cli::session_cmd::LoginArgs;
use notes_cli::watch_cmd;
use notes_cli::watch_cmd::WatchArgs;
use tracing_subscriber::EnvFilter;

/// Notes client for the hosted notes GraphQL backend.
#[derive(Debug, Parser)]
#[command(name = "notes", version)]
struct Cli {
    /// Directory holding config.toml and session.json.
    /// Defaults to $NOTES_HOME, then ~/.notes.
    #[arg(long = "notes-home", global = true)]
    notes_home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a session token issued by the identity provider.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Print all notes.
    List(ListArgs),
    /// Create a note.
    Add(AddArgs),
    /// Delete a note by id.
    Delete(DeleteArgs),
    /// Keep a live view of the notes open until Ctrl+C.
    Watch(WatchArgs),
    /// Print the resolved configuration.
    Config,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(match cli.command {
        Command::Watch(_) => "info",
        _ => "warn",
    });

    let notes_home = resolve_notes_home(cli.notes_home)?;
    match cli.command {
        Command::Login(args) => session_cmd::run_login(&notes_home, args),
        Command::Logout => session_cmd::run_logout(&notes_home),
        Command::List(args) => notes_cmd::run_list(load_config(notes_home)?, args).await,
        Command::Add(args) => notes_cmd::run_add(load_config(notes_home)?, args).await,
        Command::Delete(args) => notes_cmd::run_delete(load_config(notes_home)?, args).await,
        Command::Watch(args) => watch_cmd::run_watch(load_config(notes_home)?, args).await,
        Command::Config => notes_cmd::run_config(&load_config(notes_home)?),
    }
}
