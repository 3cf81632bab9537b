//! Plain-text rendering of notes and the watch view.

use std::fmt::Write as _;

use notes_core::Note;
use notes_core::NotesViewModel;
use notes_core::ViewState;

pub fn render_note(note: &Note) -> String {
    if note.details.is_empty() {
        format!("[{}] {}", note.id, note.name)
    } else {
        format!("[{}] {}: {}", note.id, note.name, note.details)
    }
}

pub fn render_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> String {
    let lines: Vec<String> = notes.into_iter().map(render_note).collect();
    if lines.is_empty() {
        "No notes.".to_string()
    } else {
        lines.join("\n")
    }
}

/// One full frame of the watch view.
pub fn render_view(vm: &NotesViewModel) -> String {
    let mut out = String::new();
    match vm.state() {
        ViewState::Unauthenticated => {
            out.push_str("Not signed in.");
            return out;
        }
        ViewState::Loading => {
            out.push_str("Loading notes...");
            return out;
        }
        ViewState::Ready => {}
    }

    let _ = writeln!(out, "── Notes ({}) ──", vm.notes().len());
    out.push_str(&render_notes(vm.notes()));

    let draft = vm.draft();
    if !draft.is_empty() {
        let _ = write!(out, "\n── Draft ──\nname: {}\ndetails: {}", draft.name, draft.details);
    }
    out
}
