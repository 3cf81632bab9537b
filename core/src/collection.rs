//! The locally held, ordered list of notes and the fold that keeps it in
//! step with the backend's change streams.
//!
//! The fold is deliberately naive: creates append without checking for an
//! existing id, updates touch the first match only, deletes drop every
//! match. Events for the same note may race the mutation that caused them,
//! so none of these rules assume any particular ordering.

use crate::note::{ChangeEvent, Note};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesCollection {
    notes: Vec<Note>,
}

impl NotesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_notes(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn as_slice(&self) -> &[Note] {
        &self.notes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Replaces the whole collection, keeping server order.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Appends unconditionally; duplicates are kept.
    pub fn append(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Replaces the first entry with the same id. Returns false when no
    /// entry matched.
    pub fn replace(&mut self, note: Note) -> bool {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(slot) => {
                *slot = note;
                true
            }
            None => false,
        }
    }

    /// Removes every entry with `id`. Returns how many were removed.
    pub fn remove(&mut self, id: &str) -> usize {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        before - self.notes.len()
    }

    /// Applies one change event. Returns whether anything changed.
    pub fn fold(&mut self, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::Created(note) => {
                self.append(note);
                true
            }
            ChangeEvent::Updated(note) => self.replace(note),
            ChangeEvent::Deleted(note) => self.remove(&note.id) > 0,
        }
    }
}

impl<'a> IntoIterator for &'a NotesCollection {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}
