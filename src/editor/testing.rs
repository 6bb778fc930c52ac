//! Deterministic host and collaborator fakes for engine tests.

use super::platform::{LocalTask, Platform, TimerId};
use super::session::{EditorStatus, SessionView};
use crate::api::{ApiError, ApiResult, CompletionProvider, CompletionRequest, NotesApi};
use crate::models::{Note, NoteId};
use crate::util::Clock;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct PendingTimer {
    id: TimerId,
    due_ms: i64,
    callback: Box<dyn FnOnce()>,
}

/// Virtual clock, manually advanced timers and a FIFO of spawned tasks.
#[derive(Default)]
pub(crate) struct TestPlatform {
    now: Cell<i64>,
    next_timer: Cell<TimerId>,
    timers: RefCell<Vec<PendingTimer>>,
    tasks: RefCell<VecDeque<LocalTask>>,
    navigations: RefCell<Vec<String>>,
    confirm_answer: Cell<bool>,
}

impl TestPlatform {
    pub fn starting_at(now_ms: i64) -> Self {
        let p = Self::default();
        p.now.set(now_ms);
        p
    }

    /// Move the clock forward, firing due timers in deadline order.
    pub fn advance(&self, ms: i64) {
        let target = self.now.get() + ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let idx = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due_ms <= target)
                    .min_by_key(|(_, t)| (t.due_ms, t.id))
                    .map(|(i, _)| i);
                idx.map(|i| timers.remove(i))
            };
            let Some(timer) = next else {
                break;
            };
            self.now.set(timer.due_ms);
            (timer.callback)();
        }
        self.now.set(target);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn queued_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn take_task(&self) -> Option<LocalTask> {
        self.tasks.borrow_mut().pop_front()
    }

    /// Drive every queued task (and any they spawn) to completion, oldest first.
    pub async fn run_tasks(&self) {
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            task.await;
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }

    pub fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.set(answer);
    }
}

impl Clock for TestPlatform {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

impl Platform for TestPlatform {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_timer.get() + 1;
        self.next_timer.set(id);
        self.timers.borrow_mut().push(PendingTimer {
            id,
            due_ms: self.now.get() + i64::from(delay_ms),
            callback,
        });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }

    fn spawn(&self, task: LocalTask) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn navigate(&self, path: &str) {
        self.navigations.borrow_mut().push(path.to_string());
    }

    fn confirm(&self, _message: &str) -> bool {
        self.confirm_answer.get()
    }
}

/// Poll a future exactly once; lets tests interleave in-flight requests by hand.
pub(crate) fn poll_once<F: Future + Unpin + ?Sized>(fut: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(fut).poll(&mut cx)
}

#[derive(Default)]
pub(crate) struct RecordingView {
    pub title: RefCell<String>,
    pub text: RefCell<String>,
    pub suggestion: RefCell<String>,
    pub statuses: RefCell<Vec<EditorStatus>>,
    pub draft_restored: Cell<bool>,
}

impl RecordingView {
    pub fn last_status(&self) -> Option<EditorStatus> {
        self.statuses.borrow().last().cloned()
    }
}

impl SessionView for RecordingView {
    fn fields_loaded(&self, title: &str, text: &str) {
        *self.title.borrow_mut() = title.to_string();
        *self.text.borrow_mut() = text.to_string();
    }

    fn text_changed(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }

    fn suggestion_changed(&self, suggestion: &str) {
        *self.suggestion.borrow_mut() = suggestion.to_string();
    }

    fn status_changed(&self, status: &EditorStatus) {
        self.statuses.borrow_mut().push(status.clone());
    }

    fn draft_restored(&self, restored: bool) {
        self.draft_restored.set(restored);
    }
}

/// In-memory notes table for a single owner.
#[derive(Default)]
pub(crate) struct FakeNotes {
    notes: RefCell<BTreeMap<NoteId, Note>>,
    next_id: Cell<i64>,
    fail_next: RefCell<Option<ApiError>>,
    held: Rc<Cell<bool>>,
    pub calls: Cell<usize>,
}

/// Pending while the flag is set.
struct Held(Rc<Cell<bool>>);

impl Future for Held {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.0.get() {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}

impl FakeNotes {
    pub fn with_note(id: i64, title: &str, text: &str, updated_at: &str) -> Self {
        let fake = Self::default();
        fake.insert(Note {
            id: NoteId(id),
            user_id: Some("42".to_string()),
            title: title.to_string(),
            text: text.to_string(),
            created_at: Some(updated_at.to_string()),
            updated_at: Some(updated_at.to_string()),
        });
        fake.next_id.set(id);
        fake
    }

    pub fn insert(&self, note: Note) {
        self.notes.borrow_mut().insert(note.id, note);
    }

    pub fn get(&self, id: i64) -> Option<Note> {
        self.notes.borrow().get(&NoteId(id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn fail_next(&self, e: ApiError) {
        *self.fail_next.borrow_mut() = Some(e);
    }

    /// While held, writes are counted but stay in flight.
    pub fn hold_writes(&self, held: bool) {
        self.held.set(held);
    }

    async fn begin_write(&self) -> ApiResult<()> {
        self.calls.set(self.calls.get() + 1);
        Held(self.held.clone()).await;
        match self.fail_next.borrow_mut().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn begin(&self) -> ApiResult<()> {
        self.calls.set(self.calls.get() + 1);
        match self.fail_next.borrow_mut().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl NotesApi for FakeNotes {
    async fn get_note(&self, id: NoteId) -> ApiResult<Note> {
        self.begin()?;
        self.notes
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Note not found"))
    }

    async fn list_notes(&self) -> ApiResult<Vec<Note>> {
        self.begin()?;
        Ok(self.notes.borrow().values().cloned().collect())
    }

    async fn create_note(&self, title: &str, text: &str) -> ApiResult<Note> {
        self.begin_write().await?;
        let id = NoteId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        let note = Note {
            id,
            user_id: Some("42".to_string()),
            title: title.to_string(),
            text: text.to_string(),
            created_at: Some("2024-01-03T00:00:00Z".to_string()),
            updated_at: None,
        };
        self.insert(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, title: &str, text: &str) -> ApiResult<Note> {
        self.begin_write().await?;
        let mut notes = self.notes.borrow_mut();
        let note = notes
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Note not found"))?;
        note.title = title.to_string();
        note.text = text.to_string();
        note.updated_at = Some("2024-01-03T00:00:00Z".to_string());
        Ok(note.clone())
    }

    async fn delete_note(&self, id: NoteId) -> ApiResult<()> {
        self.begin_write().await?;
        self.notes
            .borrow_mut()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("Note not found"))
    }
}

/// Answers immediately: queued replies first, then `default_reply`.
pub(crate) struct ScriptedProvider {
    replies: RefCell<VecDeque<ApiResult<String>>>,
    default_reply: String,
    pub requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn always(reply: &str) -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            default_reply: reply.to_string(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn then(self, reply: ApiResult<String>) -> Self {
        self.replies.borrow_mut().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult<String> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

#[derive(Default)]
struct Gate {
    reply: RefCell<Option<ApiResult<String>>>,
}

struct GateFuture(Rc<Gate>);

impl Future for GateFuture {
    type Output = ApiResult<String>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.0.reply.borrow_mut().take() {
            Some(reply) => Poll::Ready(reply),
            None => Poll::Pending,
        }
    }
}

/// Each call stays in flight until the test releases it; replies may be released out of order.
#[derive(Default)]
pub(crate) struct GatedProvider {
    gates: RefCell<Vec<Rc<Gate>>>,
}

impl GatedProvider {
    pub fn calls(&self) -> usize {
        self.gates.borrow().len()
    }

    pub fn release(&self, call: usize, reply: ApiResult<String>) {
        let gate = self.gates.borrow()[call].clone();
        *gate.reply.borrow_mut() = Some(reply);
    }
}

impl CompletionProvider for GatedProvider {
    async fn complete(&self, _request: &CompletionRequest) -> ApiResult<String> {
        let gate = Rc::new(Gate::default());
        self.gates.borrow_mut().push(gate.clone());
        GateFuture(gate).await
    }
}
