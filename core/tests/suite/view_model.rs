use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use notes_core::ChangeEvent;
use notes_core::ChangeKind;
use notes_core::ClientError;
use notes_core::ClientResult;
use notes_core::DraftNote;
use notes_core::Note;
use notes_core::NoteSubscription;
use notes_core::NotesBackend;
use notes_core::NotesViewModel;
use notes_core::SyncMode;
use notes_core::ViewState;
use notes_core::ViewUpdate;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// In-memory backend that records calls and lets tests push change events.
#[derive(Default)]
struct FakeBackend {
    lists: Mutex<VecDeque<ClientResult<Vec<Note>>>>,
    list_calls: AtomicUsize,
    list_gate: Option<Arc<Notify>>,
    fail_mutations: bool,
    mutation_delay: Option<Duration>,
    fail_subscribe: Option<ChangeKind>,
    creates: Mutex<Vec<DraftNote>>,
    deletes: Mutex<Vec<String>>,
    streams: Mutex<HashMap<ChangeKind, mpsc::Sender<ClientResult<ChangeEvent>>>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl FakeBackend {
    fn with_lists(lists: Vec<Vec<Note>>) -> Self {
        Self {
            lists: Mutex::new(lists.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().unwrap().clone()
    }

    async fn emit(&self, kind: ChangeKind, item: ClientResult<ChangeEvent>) {
        let tx = self.streams.lock().unwrap().get(&kind).cloned();
        tx.expect("stream not open").send(item).await.unwrap();
    }

    async fn wait_for_streams(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.streams.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriptions never opened");
    }
}

#[async_trait]
impl NotesBackend for FakeBackend {
    async fn list_notes(&self) -> ClientResult<Vec<Note>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        self.lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create_note(&self, draft: &DraftNote) -> ClientResult<Note> {
        if let Some(delay) = self.mutation_delay {
            tokio::time::sleep(delay).await;
        }
        self.creates.lock().unwrap().push(draft.clone());
        if self.fail_mutations {
            return Err(ClientError::Stream("connection reset".to_string()));
        }
        Ok(Note::new("new", draft.name.clone(), draft.details.clone()))
    }

    async fn delete_note(&self, id: &str) -> ClientResult<Option<Note>> {
        if let Some(delay) = self.mutation_delay {
            tokio::time::sleep(delay).await;
        }
        self.deletes.lock().unwrap().push(id.to_string());
        if self.fail_mutations {
            return Err(ClientError::Stream("connection reset".to_string()));
        }
        Ok(None)
    }

    async fn subscribe(&self, kind: ChangeKind) -> ClientResult<NoteSubscription> {
        if self.fail_subscribe == Some(kind) {
            return Err(ClientError::ApiResponse {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        self.streams.lock().unwrap().insert(kind, tx);
        self.tokens.lock().unwrap().push(token.clone());
        Ok(NoteSubscription::new(kind, rx, token))
    }
}

fn note(id: &str, name: &str, details: &str) -> Note {
    Note::new(id, name, details)
}

async fn next(vm: &mut NotesViewModel) -> ViewUpdate {
    tokio::time::timeout(Duration::from_secs(5), vm.next_update())
        .await
        .expect("no update arrived")
        .expect("channel closed")
}

/// Applies updates until `done` holds.
async fn pump_until(vm: &mut NotesViewModel, done: impl Fn(&NotesViewModel) -> bool) {
    while !done(vm) {
        let update = next(vm).await;
        vm.apply(update);
    }
}

#[tokio::test]
async fn initial_list_then_create_and_delete_events() {
    let backend = Arc::new(FakeBackend::with_lists(vec![vec![note("1", "A", "a")]]));
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);

    vm.mount(backend.clone()).await;
    assert_eq!(vm.state(), ViewState::Loading);

    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;
    assert_eq!(vm.notes().as_slice(), &[note("1", "A", "a")]);

    backend.wait_for_streams(3).await;
    assert_eq!(vm.active_subscriptions(), 3);

    backend
        .emit(ChangeKind::Created, Ok(ChangeEvent::Created(note("2", "B", "b"))))
        .await;
    pump_until(&mut vm, |vm| vm.notes().len() == 2).await;
    assert_eq!(
        vm.notes().as_slice(),
        &[note("1", "A", "a"), note("2", "B", "b")]
    );

    backend
        .emit(ChangeKind::Deleted, Ok(ChangeEvent::Deleted(note("1", "A", "a"))))
        .await;
    pump_until(&mut vm, |vm| vm.notes().len() == 1).await;
    assert_eq!(vm.notes().as_slice(), &[note("2", "B", "b")]);
}

#[tokio::test]
async fn update_event_replaces_in_place() {
    let backend = Arc::new(FakeBackend::with_lists(vec![vec![
        note("1", "A", "a"),
        note("2", "B", "b"),
    ]]));
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;
    backend.wait_for_streams(3).await;

    backend
        .emit(ChangeKind::Updated, Ok(ChangeEvent::Updated(note("1", "A2", "a2"))))
        .await;
    pump_until(&mut vm, |vm| vm.notes().get("1").is_some_and(|n| n.name == "A2")).await;
    assert_eq!(
        vm.notes().as_slice(),
        &[note("1", "A2", "a2"), note("2", "B", "b")]
    );
}

#[tokio::test]
async fn subscription_error_keeps_stream_open() {
    let backend = Arc::new(FakeBackend::default());
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;
    backend.wait_for_streams(3).await;

    backend
        .emit(
            ChangeKind::Created,
            Err(ClientError::Parse("bad payload".to_string())),
        )
        .await;
    let update = next(&mut vm).await;
    assert!(matches!(
        update,
        ViewUpdate::SubscriptionFailed {
            kind: ChangeKind::Created,
            ..
        }
    ));
    assert!(!vm.apply(update));

    backend
        .emit(ChangeKind::Created, Ok(ChangeEvent::Created(note("1", "A", "a"))))
        .await;
    pump_until(&mut vm, |vm| vm.notes().len() == 1).await;
}

#[tokio::test]
async fn submit_clears_draft_even_when_create_fails() {
    let backend = Arc::new(FakeBackend {
        fail_mutations: true,
        ..Default::default()
    });
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;

    vm.set_draft_name("Groceries");
    vm.set_draft_details("Milk, eggs");
    let submitted = vm.submit();

    assert_eq!(submitted, Some(DraftNote::new("Groceries", "Milk, eggs")));
    assert!(vm.draft().is_empty());

    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.creates.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        backend.creates.lock().unwrap().as_slice(),
        &[DraftNote::new("Groceries", "Milk, eggs")]
    );
    // No optimistic insert.
    assert!(vm.notes().is_empty());
}

#[tokio::test]
async fn remount_and_unmount_unsubscribe_all_streams() {
    let first = Arc::new(FakeBackend::default());
    let second = Arc::new(FakeBackend::default());
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);

    vm.mount(first.clone()).await;
    first.wait_for_streams(3).await;
    let first_tokens = first.tokens();
    assert_eq!(first_tokens.len(), 3);
    assert!(first_tokens.iter().all(|t| !t.is_cancelled()));

    vm.mount(second.clone()).await;
    assert!(first_tokens.iter().all(CancellationToken::is_cancelled));
    second.wait_for_streams(3).await;

    vm.unmount().await;
    let second_tokens = second.tokens();
    assert_eq!(second_tokens.len(), 3);
    assert!(second_tokens.iter().all(CancellationToken::is_cancelled));
    assert_eq!(vm.state(), ViewState::Unauthenticated);
    assert_eq!(vm.active_subscriptions(), 0);
    assert!(vm.notes().is_empty());
}

#[tokio::test]
async fn mounting_the_same_backend_is_a_noop() {
    let backend = Arc::new(FakeBackend::default());
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);

    vm.mount(backend.clone()).await;
    let generation = vm.generation();
    backend.wait_for_streams(3).await;

    vm.mount(backend.clone()).await;
    assert_eq!(vm.generation(), generation);
    assert_eq!(backend.tokens().len(), 3);
    assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn list_from_previous_mount_is_discarded() {
    let gate = Arc::new(Notify::new());
    let slow = Arc::new(FakeBackend {
        lists: Mutex::new(VecDeque::from([Ok(vec![note("old", "O", "o")])])),
        list_gate: Some(gate.clone()),
        ..Default::default()
    });
    let fast = Arc::new(FakeBackend::with_lists(vec![vec![note("new", "N", "n")]]));
    let mut vm = NotesViewModel::new(SyncMode::Reload);

    vm.mount(slow.clone()).await;
    vm.mount(fast.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;
    assert_eq!(vm.notes().as_slice(), &[note("new", "N", "n")]);

    gate.notify_one();
    let stale = next(&mut vm).await;
    assert!(matches!(stale, ViewUpdate::Listed { .. }));
    assert!(!vm.apply(stale));
    assert_eq!(vm.notes().as_slice(), &[note("new", "N", "n")]);
}

#[tokio::test]
async fn reload_mode_reloads_after_delete() {
    let backend = Arc::new(FakeBackend::with_lists(vec![
        vec![note("1", "A", "a"), note("2", "B", "b")],
        vec![note("2", "B", "b")],
    ]));
    let mut vm = NotesViewModel::new(SyncMode::Reload);
    vm.mount(backend.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;
    assert_eq!(vm.active_subscriptions(), 0);

    assert!(vm.delete("1"));
    pump_until(&mut vm, |vm| vm.notes().len() == 1).await;

    assert_eq!(vm.notes().as_slice(), &[note("2", "B", "b")]);
    assert_eq!(backend.list_calls(), 2);
    assert_eq!(backend.deletes.lock().unwrap().as_slice(), &["1".to_string()]);
}

#[tokio::test]
async fn reload_mode_reloads_even_when_delete_fails() {
    let backend = Arc::new(FakeBackend {
        lists: Mutex::new(VecDeque::from([
            Ok(vec![note("1", "A", "a")]),
            Ok(vec![note("1", "A", "a")]),
        ])),
        fail_mutations: true,
        ..Default::default()
    });
    let mut vm = NotesViewModel::new(SyncMode::Reload);
    vm.mount(backend.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;

    vm.delete("1");
    let deleted = next(&mut vm).await;
    assert!(matches!(deleted, ViewUpdate::Deleted { result: Err(_), .. }));
    vm.apply(deleted);

    let listed = next(&mut vm).await;
    assert!(matches!(listed, ViewUpdate::Listed { .. }));
    vm.apply(listed);
    assert_eq!(backend.list_calls(), 2);
    assert_eq!(vm.notes().as_slice(), &[note("1", "A", "a")]);
}

#[tokio::test]
async fn subscriptions_mode_does_not_reload_after_delete() {
    let backend = Arc::new(FakeBackend::with_lists(vec![vec![note("1", "A", "a")]]));
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;
    pump_until(&mut vm, |vm| vm.state() == ViewState::Ready).await;

    vm.delete("1");
    loop {
        let update = next(&mut vm).await;
        let is_delete = matches!(update, ViewUpdate::Deleted { .. });
        assert!(!vm.apply(update));
        if is_delete {
            break;
        }
    }

    // Local state waits for the deleted event.
    assert_eq!(vm.notes().as_slice(), &[note("1", "A", "a")]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    vm.drain_pending();
    assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn unmount_waits_for_pending_mutations() {
    let backend = Arc::new(FakeBackend {
        mutation_delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let mut vm = NotesViewModel::new(SyncMode::Reload);
    vm.mount(backend.clone()).await;

    vm.set_draft_name("Groceries");
    vm.set_draft_details("Milk");
    assert!(vm.submit().is_some());
    assert!(vm.delete("1"));
    vm.unmount().await;

    assert_eq!(
        backend.creates.lock().unwrap().as_slice(),
        &[DraftNote::new("Groceries", "Milk")]
    );
    assert_eq!(backend.deletes.lock().unwrap().as_slice(), &["1".to_string()]);
}

#[tokio::test]
async fn flush_mutations_allows_later_submits() {
    let backend = Arc::new(FakeBackend::default());
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;

    vm.set_draft_name("First");
    vm.submit();
    vm.flush_mutations().await;
    assert_eq!(backend.creates.lock().unwrap().len(), 1);

    vm.set_draft_name("Second");
    vm.submit();
    vm.flush_mutations().await;
    assert_eq!(backend.creates.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_subscribe_leaves_the_active_count() {
    let backend = Arc::new(FakeBackend {
        fail_subscribe: Some(ChangeKind::Updated),
        ..Default::default()
    });
    let mut vm = NotesViewModel::new(SyncMode::Subscriptions);
    vm.mount(backend.clone()).await;

    pump_until(&mut vm, |vm| {
        vm.state() == ViewState::Ready && vm.active_subscriptions() == 2
    })
    .await;
    backend.wait_for_streams(2).await;
    assert_eq!(vm.active_subscriptions(), 2);
}
