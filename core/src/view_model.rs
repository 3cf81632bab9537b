//! State behind the notes view.
//!
//! [`NotesViewModel`] is owned by whoever renders it and only changes
//! through `&mut self`. Network work runs in spawned tasks that report back
//! as [`ViewUpdate`]s on an internal channel; the owner pulls them with
//! [`next_update`](NotesViewModel::next_update) and feeds them to
//! [`apply`](NotesViewModel::apply).
//!
//! Every update is tagged with the mount generation it was started under.
//! Updates from an earlier generation are dropped, so a list result or a
//! change event that arrives after the backend was swapped or the view was
//! unmounted never touches the current state.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::{ClientError, ClientResult, NotesBackend};
use crate::collection::NotesCollection;
use crate::config_loader::SyncMode;
use crate::note::{ChangeEvent, ChangeKind, DraftNote, Note};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No backend mounted; the caller should send the user to sign in.
    Unauthenticated,
    /// Mounted, initial list still in flight.
    Loading,
    Ready,
}

/// Result of background work, delivered to the owner.
#[derive(Debug)]
pub enum ViewUpdate {
    Listed {
        generation: u64,
        request: u64,
        result: ClientResult<Vec<Note>>,
    },
    Change {
        generation: u64,
        event: ChangeEvent,
    },
    SubscriptionFailed {
        generation: u64,
        kind: ChangeKind,
        error: ClientError,
    },
    SubscriptionClosed {
        generation: u64,
        kind: ChangeKind,
    },
    Deleted {
        generation: u64,
        id: String,
        result: ClientResult<Option<Note>>,
    },
}

impl ViewUpdate {
    pub fn generation(&self) -> u64 {
        match self {
            ViewUpdate::Listed { generation, .. }
            | ViewUpdate::Change { generation, .. }
            | ViewUpdate::SubscriptionFailed { generation, .. }
            | ViewUpdate::SubscriptionClosed { generation, .. }
            | ViewUpdate::Deleted { generation, .. } => *generation,
        }
    }
}

struct ActiveSubscription {
    kind: ChangeKind,
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct NotesViewModel {
    mode: SyncMode,
    state: ViewState,
    notes: NotesCollection,
    draft: DraftNote,
    backend: Option<Arc<dyn NotesBackend>>,
    generation: u64,
    /// Sequence number of the most recent list request. Only its result is
    /// applied.
    latest_list_request: u64,
    subscriptions: Vec<ActiveSubscription>,
    /// In-flight creates and deletes. Their results may be ignored but the
    /// requests themselves must not be dropped on shutdown.
    mutations: TaskTracker,
    tx: mpsc::UnboundedSender<ViewUpdate>,
    rx: mpsc::UnboundedReceiver<ViewUpdate>,
}

impl NotesViewModel {
    pub fn new(mode: SyncMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            mode,
            state: ViewState::Unauthenticated,
            notes: NotesCollection::new(),
            draft: DraftNote::default(),
            backend: None,
            generation: 0,
            latest_list_request: 0,
            subscriptions: Vec::new(),
            mutations: TaskTracker::new(),
            tx,
            rx,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn notes(&self) -> &NotesCollection {
        &self.notes
    }

    pub fn draft(&self) -> &DraftNote {
        &self.draft
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.backend.is_some()
    }

    /// Number of change streams that are open or still opening. A stream
    /// leaves the count once it has closed or failed to open.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Mounts a backend: starts the initial list and, in subscriptions mode,
    /// the three change streams.
    ///
    /// Mounting the backend that is already mounted does nothing. Mounting a
    /// different one tears the previous streams down first.
    pub async fn mount(&mut self, backend: Arc<dyn NotesBackend>) {
        if let Some(current) = &self.backend
            && same_backend(current, &backend)
        {
            return;
        }

        self.teardown().await;
        self.generation += 1;
        self.notes.clear();
        self.state = ViewState::Loading;
        self.backend = Some(backend.clone());
        tracing::info!("view mounted (generation {}, {} mode)", self.generation, self.mode);

        self.spawn_list(backend.clone());
        if self.mode == SyncMode::Subscriptions {
            for kind in ChangeKind::all() {
                self.spawn_subscription(backend.clone(), *kind);
            }
        }
    }

    /// Drops the backend and all local state. Creates and deletes already
    /// sent are awaited first.
    pub async fn unmount(&mut self) {
        self.flush_mutations().await;
        self.teardown().await;
        self.generation += 1;
        self.backend = None;
        self.notes.clear();
        self.draft = DraftNote::default();
        self.state = ViewState::Unauthenticated;
        tracing::info!("view unmounted");
    }

    pub fn set_draft_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_draft_details(&mut self, details: impl Into<String>) {
        self.draft.details = details.into();
    }

    /// Sends the draft to the backend and clears it immediately.
    ///
    /// The create runs in the background and its outcome is only logged; the new note
    /// shows up through the created stream or the next reload. Returns the
    /// submitted draft, or `None` (draft untouched) when nothing is mounted.
    pub fn submit(&mut self) -> Option<DraftNote> {
        let backend = self.backend.clone()?;
        let draft = self.draft.take();
        let submitted = draft.clone();

        self.mutations.spawn(async move {
            match backend.create_note(&draft).await {
                Ok(note) => tracing::info!("created note {}", note.id),
                Err(e) => tracing::warn!("createNote failed: {e}"),
            }
        });

        Some(submitted)
    }

    /// Deletes a note by id. Returns false when nothing is mounted.
    ///
    /// Local state is not touched here. In subscriptions mode the deleted
    /// stream removes the note; in reload mode the collection is reloaded
    /// once the delete settles, whatever its outcome.
    pub fn delete(&mut self, id: impl Into<String>) -> bool {
        let Some(backend) = self.backend.clone() else {
            return false;
        };
        let id = id.into();
        let tx = self.tx.clone();
        let generation = self.generation;

        self.mutations.spawn(async move {
            let result = backend.delete_note(&id).await;
            let _ = tx.send(ViewUpdate::Deleted {
                generation,
                id,
                result,
            });
        });
        true
    }

    /// Re-runs the list query. Returns false when nothing is mounted.
    pub fn reload(&mut self) -> bool {
        match self.backend.clone() {
            Some(backend) => {
                self.spawn_list(backend);
                true
            }
            None => false,
        }
    }

    /// Waits until every create and delete started so far has settled.
    pub async fn flush_mutations(&self) {
        if self.mutations.is_empty() {
            return;
        }
        tracing::debug!("waiting for {} pending mutations", self.mutations.len());
        self.mutations.close();
        self.mutations.wait().await;
        self.mutations.reopen();
    }

    /// Waits for the next background result.
    pub async fn next_update(&mut self) -> Option<ViewUpdate> {
        self.rx.recv().await
    }

    /// Applies every update that is already waiting. Returns whether the
    /// visible state changed.
    pub fn drain_pending(&mut self) -> bool {
        let mut changed = false;
        while let Ok(update) = self.rx.try_recv() {
            changed |= self.apply(update);
        }
        changed
    }

    /// Applies one update. Returns whether the visible state changed.
    pub fn apply(&mut self, update: ViewUpdate) -> bool {
        if update.generation() != self.generation {
            tracing::debug!(
                "dropping update from generation {} (current {})",
                update.generation(),
                self.generation
            );
            return false;
        }

        match update {
            ViewUpdate::Listed {
                request, result, ..
            } => {
                if request != self.latest_list_request {
                    tracing::debug!("dropping superseded list result #{request}");
                    return false;
                }
                let was_loading = self.state == ViewState::Loading;
                self.state = ViewState::Ready;
                match result {
                    Ok(notes) => {
                        tracing::debug!("listed {} notes", notes.len());
                        self.notes.replace_all(notes);
                        true
                    }
                    Err(e) => {
                        tracing::warn!("listNotes failed: {e}");
                        was_loading
                    }
                }
            }
            ViewUpdate::Change { event, .. } => {
                if self.mode != SyncMode::Subscriptions {
                    return false;
                }
                tracing::debug!("{} event for note {}", event.kind(), event.note().id);
                self.notes.fold(event)
            }
            ViewUpdate::SubscriptionFailed { kind, error, .. } => {
                tracing::warn!("{kind} subscription error: {error}");
                false
            }
            ViewUpdate::SubscriptionClosed { kind, .. } => {
                tracing::info!("{kind} subscription closed");
                self.subscriptions.retain(|s| s.kind != kind);
                false
            }
            ViewUpdate::Deleted { id, result, .. } => {
                match result {
                    Ok(_) => tracing::info!("deleted note {id}"),
                    Err(e) => tracing::warn!("deleteNote {id} failed: {e}"),
                }
                if self.mode == SyncMode::Reload {
                    self.reload();
                }
                false
            }
        }
    }

    fn spawn_list(&mut self, backend: Arc<dyn NotesBackend>) {
        self.latest_list_request += 1;
        let request = self.latest_list_request;
        let generation = self.generation;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = backend.list_notes().await;
            let _ = tx.send(ViewUpdate::Listed {
                generation,
                request,
                result,
            });
        });
    }

    fn spawn_subscription(&mut self, backend: Arc<dyn NotesBackend>, kind: ChangeKind) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let tx = self.tx.clone();
        let generation = self.generation;

        let task = tokio::spawn(async move {
            let subscribed = tokio::select! {
                _ = task_token.cancelled() => return,
                result = backend.subscribe(kind) => result,
            };
            let mut subscription = match subscribed {
                Ok(subscription) => subscription,
                Err(error) => {
                    let _ = tx.send(ViewUpdate::SubscriptionFailed {
                        generation,
                        kind,
                        error,
                    });
                    let _ = tx.send(ViewUpdate::SubscriptionClosed { generation, kind });
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        subscription.unsubscribe();
                        break;
                    }
                    item = subscription.next() => {
                        let update = match item {
                            Some(Ok(event)) => ViewUpdate::Change { generation, event },
                            Some(Err(error)) => ViewUpdate::SubscriptionFailed {
                                generation,
                                kind,
                                error,
                            },
                            None => {
                                let _ = tx.send(ViewUpdate::SubscriptionClosed { generation, kind });
                                break;
                            }
                        };
                        if tx.send(update).is_err() {
                            subscription.unsubscribe();
                            break;
                        }
                    }
                }
            }
        });

        self.subscriptions.push(ActiveSubscription { kind, token, task });
    }

    /// Cancels every change stream and waits for its task to finish.
    async fn teardown(&mut self) {
        for subscription in &self.subscriptions {
            subscription.token.cancel();
        }
        for subscription in self.subscriptions.drain(..) {
            if let Err(e) = subscription.task.await {
                tracing::warn!("{} subscription task failed: {e}", subscription.kind);
            }
        }
    }
}

impl Drop for NotesViewModel {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.token.cancel();
        }
    }
}

impl std::fmt::Debug for NotesViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotesViewModel")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("notes", &self.notes.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Identity comparison on the data pointer only; vtable pointers for the
/// same object may differ across codegen units.
fn same_backend(a: &Arc<dyn NotesBackend>, b: &Arc<dyn NotesBackend>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
