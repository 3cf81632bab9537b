//! Root of the `notes-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output goes through the CLI or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod client;
pub mod collection;
pub mod config_loader;
pub mod default_client;
pub mod note;
pub mod provider;
pub mod view_model;

pub use client::ClientError;
pub use client::ClientResult;
pub use client::NoteSubscription;
pub use client::NotesBackend;
pub use client::NotesClient;
pub use collection::NotesCollection;
pub use config_loader::AuthType;
pub use config_loader::ConfigLoader;
pub use config_loader::NotesConfig;
pub use config_loader::SyncMode;
pub use note::ChangeEvent;
pub use note::ChangeKind;
pub use note::DraftNote;
pub use note::Note;
pub use provider::ClientProvider;
pub use view_model::NotesViewModel;
pub use view_model::ViewState;
pub use view_model::ViewUpdate;
