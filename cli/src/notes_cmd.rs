//! One-shot commands: `list`, `add`, `delete`, `config`.

use anyhow::Context;
use clap::Parser;
use notes_core::DraftNote;
use notes_core::NotesBackend;
use notes_core::NotesConfig;

use crate::client_provider;
use crate::explain;
use crate::render::render_note;
use crate::render::render_notes;

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    #[arg(long = "name", short = 'n')]
    pub name: String,

    #[arg(long = "details", short = 'd', default_value = "")]
    pub details: String,
}

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Id of the note to delete.
    pub id: String,
}

pub async fn run_list(config: NotesConfig, args: ListArgs) -> anyhow::Result<()> {
    let provider = client_provider(config);
    let client = provider.get_client().await.map_err(explain)?;
    let notes = client.list_notes().await.map_err(explain)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&notes).context("failed to serialize notes")?
        );
    } else {
        println!("{}", render_notes(&notes));
    }
    Ok(())
}

pub async fn run_add(config: NotesConfig, args: AddArgs) -> anyhow::Result<()> {
    let provider = client_provider(config);
    let client = provider.get_client().await.map_err(explain)?;
    let note = client
        .create_note(&DraftNote::new(args.name, args.details))
        .await
        .map_err(explain)?;
    println!("Created {}", render_note(&note));
    Ok(())
}

pub async fn run_delete(config: NotesConfig, args: DeleteArgs) -> anyhow::Result<()> {
    let provider = client_provider(config);
    let client = provider.get_client().await.map_err(explain)?;
    match client.delete_note(&args.id).await.map_err(explain)? {
        Some(note) => println!("Deleted {}", render_note(&note)),
        None => println!("Deleted {}", args.id),
    }
    Ok(())
}

/// Prints the resolved configuration. The API key is never printed.
pub fn run_config(config: &NotesConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{rendered}");
    if config.api_key.is_some() {
        println!("# api_key is set");
    }
    Ok(())
}
