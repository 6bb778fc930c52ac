use super::error::EditorError;
use super::fetcher::{FetchOutcome, Generation, SuggestionFetcher};
use super::platform::{Debouncer, Platform};
use super::reconcile::{reconcile, ContentSource};
use super::scheduler::SuggestionScheduler;
use crate::api::{CompletionProvider, NotesApi};
use crate::auth::{AuthStore, Credential};
use crate::config::SuggestConfig;
use crate::drafts::{DraftKey, DraftStore};
use crate::models::{Note, NoteId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) const LOGIN_PATH: &str = "/login";
pub(crate) const NOTES_PATH: &str = "/notes";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EditorStatus {
    Idle,
    Loading,
    DraftSaved,
    DraftRestored,
    Saving,
    Saved,
    Deleting,
    /// Rejected locally before any request.
    Invalid(String),
    Failed(String),
    SuggestionUnavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr)]
pub(crate) enum StatusTone {
    #[strum(serialize = "text-muted-foreground")]
    Muted,
    #[strum(serialize = "text-green-600")]
    Success,
    #[strum(serialize = "text-yellow-600")]
    Warning,
    #[strum(serialize = "text-destructive")]
    Error,
}

impl EditorStatus {
    pub fn message(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Loading => "Loading note...",
            Self::DraftSaved => "Draft saved locally",
            Self::DraftRestored => "Draft restored",
            Self::Saving => "Saving...",
            Self::Saved => "Saved",
            Self::Deleting => "Deleting...",
            Self::Invalid(msg) | Self::Failed(msg) => msg,
            Self::SuggestionUnavailable => "Suggestions are unavailable right now",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            Self::DraftRestored | Self::Saved => StatusTone::Success,
            Self::Invalid(_) => StatusTone::Warning,
            Self::Failed(_) => StatusTone::Error,
            _ => StatusTone::Muted,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Saving | Self::Deleting)
    }
}

/// Render hooks for one editing screen.
pub(crate) trait SessionView {
    fn fields_loaded(&self, title: &str, text: &str);
    /// Text rewritten by the session (accepting a suggestion), not by the user.
    fn text_changed(&self, text: &str);
    fn suggestion_changed(&self, suggestion: &str);
    fn status_changed(&self, status: &EditorStatus);
    fn draft_restored(&self, restored: bool);
}

pub(crate) struct SessionDeps<A, P> {
    pub api: Rc<A>,
    pub provider: Rc<P>,
    pub platform: Rc<dyn Platform>,
    pub drafts: DraftStore,
    pub auth: AuthStore,
    pub view: Rc<dyn SessionView>,
    pub config: SuggestConfig,
}

#[derive(Default)]
struct Fields {
    title: String,
    text: String,
    suggestion: String,
    /// Set once `open` has reconciled the content; edits are refused before that.
    loaded: bool,
    /// A save or delete is in flight.
    busy: bool,
    closed: bool,
}

struct Inner<A, P> {
    note_id: Option<NoteId>,
    credential: Credential,
    draft_key: DraftKey,
    api: Rc<A>,
    platform: Rc<dyn Platform>,
    drafts: DraftStore,
    auth: AuthStore,
    view: Rc<dyn SessionView>,
    config: SuggestConfig,
    fetcher: SuggestionFetcher<P>,
    scheduler: SuggestionScheduler,
    draft_timer: Debouncer,
    settle_timer: Debouncer,
    fields: RefCell<Fields>,
}

/// State and transactions of one note-editing screen.
///
/// Built when the screen mounts and closed when it goes away; nothing is shared
/// between two sessions. Timer callbacks hold only weak references, so a
/// dropped session never fires.
pub(crate) struct EditorSession<A, P> {
    inner: Rc<Inner<A, P>>,
}

impl<A, P> Clone for EditorSession<A, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A separating space goes in unless the text is empty or already ends in whitespace.
pub(crate) fn needs_separator(text: &str, suggestion: &str) -> bool {
    !suggestion.is_empty() && !text.is_empty() && !text.ends_with(char::is_whitespace)
}

fn insert_suggestion(text: &mut String, suggestion: &str) {
    if needs_separator(text, suggestion) {
        text.push(' ');
    }
    text.push_str(suggestion);
}

impl<A, P> EditorSession<A, P>
where
    A: NotesApi + 'static,
    P: CompletionProvider + 'static,
{
    pub fn new(note_id: Option<NoteId>, credential: Credential, deps: SessionDeps<A, P>) -> Self {
        let draft_key = DraftKey::new(credential.user_key(), note_id);
        let inner = Inner {
            note_id,
            credential,
            draft_key,
            api: deps.api,
            fetcher: SuggestionFetcher::new(deps.provider, deps.config.clone()),
            scheduler: SuggestionScheduler::new(&deps.config, deps.platform.clone()),
            draft_timer: Debouncer::new(deps.platform.clone()),
            settle_timer: Debouncer::new(deps.platform.clone()),
            platform: deps.platform,
            drafts: deps.drafts,
            auth: deps.auth,
            view: deps.view,
            config: deps.config,
            fields: RefCell::new(Fields::default()),
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    fn from_weak(weak: &Weak<Inner<A, P>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn text(&self) -> String {
        self.inner.fields.borrow().text.clone()
    }

    pub fn suggestion(&self) -> String {
        self.inner.fields.borrow().suggestion.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.fields.borrow().closed
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.fields.borrow().loaded
    }

    fn is_busy(&self) -> bool {
        self.inner.fields.borrow().busy
    }

    fn set_status(&self, status: EditorStatus) {
        self.inner.view.status_changed(&status);
    }

    /// Status from background work; a save or delete in flight keeps the line.
    fn notify(&self, status: EditorStatus) {
        if !self.is_busy() {
            self.set_status(status);
        }
    }

    fn set_busy(&self, busy: bool) {
        self.inner.fields.borrow_mut().busy = busy;
    }

    /// Stop the suggestion machinery before a request that ends the screen.
    fn pause_suggestions(&self) {
        self.inner.fetcher.supersede();
        self.inner.scheduler.cancel();
        self.inner.settle_timer.cancel();
    }

    /// Editing operations are only valid on a loaded, open session.
    fn ensure_editable(&self) -> Result<(), EditorError> {
        self.ensure_open()?;
        if !self.is_loaded() {
            return Err(EditorError::NotLoaded);
        }
        if self.is_busy() {
            return Err(EditorError::Busy);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EditorError> {
        if self.is_closed() {
            return Err(EditorError::Closed);
        }
        if self.inner.credential.is_expired(self.inner.platform.now_ms()) {
            self.handle_auth_expired();
            return Err(EditorError::AuthExpired);
        }
        Ok(())
    }

    /// Surface `err` on the status line. An expired session is torn down instead.
    fn fail(&self, err: EditorError) -> EditorError {
        match &err {
            EditorError::AuthExpired => self.handle_auth_expired(),
            EditorError::Closed => {}
            other => self.set_status(EditorStatus::Failed(other.to_string())),
        }
        err
    }

    /// Load the server copy (if any), reconcile it with the local draft and
    /// populate the fields.
    ///
    /// On failure nothing is loaded and the call may be retried.
    pub async fn open(&self) -> Result<ContentSource, EditorError> {
        self.ensure_open()?;

        let server = match self.inner.note_id {
            Some(id) => {
                self.set_status(EditorStatus::Loading);
                match self.inner.api.get_note(id).await {
                    Ok(note) => Some(note),
                    Err(e) => return Err(self.fail(e.into())),
                }
            }
            None => None,
        };
        if self.is_closed() {
            return Err(EditorError::Closed);
        }

        let draft = self.inner.drafts.load(&self.inner.draft_key);
        let picked = reconcile(draft.as_ref(), server.as_ref());
        tracing::debug!(source = ?picked.source, note_id = ?self.inner.note_id, "editor opened");

        self.inner.fetcher.supersede();
        {
            let mut f = self.inner.fields.borrow_mut();
            f.title = picked.title;
            f.text = picked.text;
            f.suggestion.clear();
            f.loaded = true;
        }

        let view = &self.inner.view;
        {
            let f = self.inner.fields.borrow();
            view.fields_loaded(&f.title, &f.text);
        }
        view.suggestion_changed("");
        view.draft_restored(picked.source == ContentSource::Draft);
        self.set_status(if picked.source == ContentSource::Draft {
            EditorStatus::DraftRestored
        } else {
            EditorStatus::Idle
        });

        Ok(picked.source)
    }

    pub fn on_text_input(&self, text: &str) {
        if self.is_closed() || !self.is_loaded() {
            return;
        }
        self.inner.fields.borrow_mut().text = text.to_string();
        self.inner.settle_timer.cancel();
        self.clear_suggestion();
        self.schedule_suggestion();
        self.schedule_draft_save();
    }

    pub fn on_title_input(&self, title: &str) {
        if self.is_closed() || !self.is_loaded() {
            return;
        }
        self.inner.fields.borrow_mut().title = title.to_string();
        self.schedule_draft_save();
    }

    /// Append the shown suggestion. A no-op unless the caret sits at the end of the text.
    pub fn accept_suggestion(&self, caret_at_end: bool) -> bool {
        if !caret_at_end || self.is_closed() {
            return false;
        }

        let text = {
            let mut f = self.inner.fields.borrow_mut();
            if f.suggestion.is_empty() {
                return false;
            }
            let suggestion = std::mem::take(&mut f.suggestion);
            insert_suggestion(&mut f.text, &suggestion);
            f.text.clone()
        };

        self.inner.fetcher.supersede();
        self.inner.scheduler.cancel();
        self.inner.view.text_changed(&text);
        self.inner.view.suggestion_changed("");
        self.schedule_draft_save();

        let weak = Rc::downgrade(&self.inner);
        self.inner
            .settle_timer
            .schedule(self.inner.config.accept_settle_ms, move || {
                if let Some(session) = Self::from_weak(&weak) {
                    session.resume_suggestions();
                }
            });
        true
    }

    fn resume_suggestions(&self) {
        if self.is_closed() {
            return;
        }
        self.clear_suggestion();
        self.schedule_suggestion();
    }

    fn clear_suggestion(&self) {
        self.inner.fetcher.supersede();
        let had = {
            let mut f = self.inner.fields.borrow_mut();
            let had = !f.suggestion.is_empty();
            f.suggestion.clear();
            had
        };
        if had {
            self.inner.view.suggestion_changed("");
        }
    }

    fn schedule_suggestion(&self) {
        let text = self.text();
        let weak = Rc::downgrade(&self.inner);
        self.inner.scheduler.on_text_changed(&text, move || {
            if let Some(session) = Self::from_weak(&weak) {
                session.on_suggest_timer();
            }
        });
    }

    fn on_suggest_timer(&self) {
        if self.is_closed() {
            return;
        }
        let (text, title, has_suggestion) = {
            let f = self.inner.fields.borrow();
            (
                f.text.clone(),
                f.title.trim().to_string(),
                !f.suggestion.is_empty(),
            )
        };
        if !self.inner.scheduler.take_query(&text, has_suggestion) {
            return;
        }

        let generation = self.inner.fetcher.supersede();
        let session = self.clone();
        self.inner.platform.spawn(Box::pin(async move {
            let outcome = session
                .inner
                .fetcher
                .request(&text, &title, generation)
                .await;
            session.apply_outcome(outcome, generation);
        }));
    }

    fn apply_outcome(&self, outcome: FetchOutcome, generation: Generation) {
        if self.is_closed() {
            return;
        }
        if outcome == FetchOutcome::AuthExpired {
            self.handle_auth_expired();
            return;
        }
        if !self.inner.fetcher.is_current(generation) {
            return;
        }

        match outcome {
            FetchOutcome::Suggestion(suggestion) => {
                self.inner.fields.borrow_mut().suggestion = suggestion.clone();
                self.inner.view.suggestion_changed(&suggestion);
            }
            FetchOutcome::Failed(reason) => {
                let err = EditorError::ProviderUnavailable(reason);
                tracing::debug!(error = %err, "suggestion hidden");
                self.inner.fields.borrow_mut().suggestion.clear();
                self.inner.view.suggestion_changed("");
                self.notify(EditorStatus::SuggestionUnavailable);
            }
            FetchOutcome::Cancelled | FetchOutcome::AuthExpired => {}
        }
    }

    fn schedule_draft_save(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.inner
            .draft_timer
            .schedule(self.inner.config.draft_delay_ms, move || {
                if let Some(session) = Self::from_weak(&weak) {
                    session.write_draft(true);
                }
            });
    }

    fn write_draft(&self, notify: bool) {
        if !self.is_loaded() {
            return;
        }
        let (title, text) = {
            let f = self.inner.fields.borrow();
            (f.title.clone(), f.text.clone())
        };
        match self.inner.drafts.save(&self.inner.draft_key, &title, &text) {
            Ok(_) if notify => self.notify(EditorStatus::DraftSaved),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %EditorError::from(e), "editing continues without a local draft");
            }
        }
    }

    /// Write a draft still waiting on its debounce. Used when the page is hidden.
    pub fn flush_pending_draft(&self) {
        if !self.inner.draft_timer.is_pending() {
            return;
        }
        self.inner.draft_timer.cancel();
        self.write_draft(false);
    }

    /// Validate, create or update, then clear the draft and leave the editor.
    ///
    /// On failure the draft stays and the user stays on the screen.
    pub async fn save(&self) -> Result<Note, EditorError> {
        self.ensure_editable()?;

        let (title, text) = {
            let f = self.inner.fields.borrow();
            (f.title.trim().to_string(), f.text.trim().to_string())
        };
        let invalid = if title.is_empty() {
            Some("Title cannot be empty.")
        } else if text.is_empty() {
            Some("The note is empty.")
        } else {
            None
        };
        if let Some(msg) = invalid {
            self.set_status(EditorStatus::Invalid(msg.to_string()));
            return Err(EditorError::Validation(msg.to_string()));
        }

        self.set_busy(true);
        self.pause_suggestions();
        self.set_status(EditorStatus::Saving);
        let result = match self.inner.note_id {
            Some(id) => self.inner.api.update_note(id, &title, &text).await,
            None => self.inner.api.create_note(&title, &text).await,
        };
        self.set_busy(false);

        match result {
            Ok(note) => {
                tracing::info!(note_id = %note.id, "note saved");
                self.inner.draft_timer.cancel();
                self.inner.drafts.clear(&self.inner.draft_key);
                self.leave(EditorStatus::Saved);
                Ok(note)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Returns `Ok(false)` when there is nothing to delete or the user declined.
    pub async fn delete(&self) -> Result<bool, EditorError> {
        let Some(id) = self.inner.note_id else {
            return Ok(false);
        };
        self.ensure_editable()?;
        if !self.inner.platform.confirm("Delete this note?") {
            return Ok(false);
        }

        self.set_busy(true);
        self.pause_suggestions();
        self.set_status(EditorStatus::Deleting);
        let result = self.inner.api.delete_note(id).await;
        self.set_busy(false);
        match result {
            Ok(()) => {
                tracing::info!(note_id = %id, "note deleted");
                self.inner.draft_timer.cancel();
                self.inner.drafts.clear(&self.inner.draft_key);
                self.leave(EditorStatus::Idle);
                Ok(true)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn leave(&self, status: EditorStatus) {
        if self.is_closed() {
            return;
        }
        self.set_status(status);
        self.close();
        self.inner.platform.navigate(NOTES_PATH);
    }

    /// Drop the credential and go to sign-in. Everything in flight is abandoned.
    pub fn handle_auth_expired(&self) {
        if self.is_closed() {
            return;
        }
        tracing::info!("session expired; redirecting to sign-in");
        self.close();
        self.inner.auth.clear();
        self.inner.platform.navigate(LOGIN_PATH);
    }

    /// Stop timers and cancel the in-flight suggestion. Pending draft edits are written first.
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.flush_pending_draft();
        self.inner.fields.borrow_mut().closed = true;
        self.inner.fetcher.supersede();
        self.inner.scheduler.cancel();
        self.inner.settle_timer.cancel();
        self.inner.draft_timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::editor::testing::{
        poll_once, FakeNotes, GatedProvider, RecordingView, ScriptedProvider, TestPlatform,
    };
    use crate::storage::{KeyValueStore, MemoryStore, TOKEN_KEY};
    use std::task::Poll;

    // 2023-11-14T22:13:20Z
    const NOW: i64 = 1_700_000_000_000;
    const BEFORE_NOW: &str = "2023-11-01T00:00:00Z";
    const AFTER_NOW: &str = "2023-12-01T00:00:00Z";

    // {"sub":42,"email":"ana@example.com","iat":1700000000,"exp":1700003600}
    const TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOjQyLCJlbWFpbCI6ImFuYUBleGFtcGxlLmNvbSIsImlhdCI6MTcwMDAwMDAwMCwiZXhwIjoxNzAwMDAzNjAwfQ.sig";

    struct Harness<P> {
        platform: Rc<TestPlatform>,
        store: Rc<MemoryStore>,
        notes: Rc<FakeNotes>,
        provider: Rc<P>,
        view: Rc<RecordingView>,
        drafts: DraftStore,
        auth: AuthStore,
        session: EditorSession<FakeNotes, P>,
    }

    fn harness_with<P: CompletionProvider + 'static>(
        note_id: Option<i64>,
        notes: FakeNotes,
        provider: P,
    ) -> Harness<P> {
        let platform = Rc::new(TestPlatform::starting_at(NOW));
        let store = Rc::new(MemoryStore::default());
        let notes = Rc::new(notes);
        let provider = Rc::new(provider);
        let view = Rc::new(RecordingView::default());
        let drafts = DraftStore::new(store.clone(), platform.clone());
        let auth = AuthStore::new(store.clone());

        let credential = Credential::from_token(TOKEN).expect("credential");
        auth.save(&credential).expect("token stored");

        let session = EditorSession::new(
            note_id.map(NoteId),
            credential,
            SessionDeps {
                api: notes.clone(),
                provider: provider.clone(),
                platform: platform.clone(),
                drafts: drafts.clone(),
                auth: auth.clone(),
                view: view.clone(),
                config: SuggestConfig::default(),
            },
        );

        Harness {
            platform,
            store,
            notes,
            provider,
            view,
            drafts,
            auth,
            session,
        }
    }

    fn harness(note_id: Option<i64>, notes: FakeNotes) -> Harness<ScriptedProvider> {
        harness_with(note_id, notes, ScriptedProvider::always("again"))
    }

    fn note_7(updated_at: &str) -> FakeNotes {
        FakeNotes::with_note(7, "Groceries", "Milk and eggs", updated_at)
    }

    fn key(note_id: Option<i64>) -> DraftKey {
        DraftKey::new("42", note_id.map(NoteId))
    }

    #[test]
    fn test_separator_rules() {
        assert!(needs_separator("Hello world", "again"));
        assert!(!needs_separator("Hello world ", "again"));
        assert!(!needs_separator("Hello world\n", "again"));
        assert!(!needs_separator("", "again"));
        assert!(!needs_separator("Hello", ""));

        let mut text = "Hello world".to_string();
        insert_suggestion(&mut text, "again");
        assert_eq!(text, "Hello world again");
    }

    #[test]
    fn test_status_tone_classes() {
        assert_eq!(EditorStatus::Saved.tone().as_ref(), "text-green-600");
        assert_eq!(
            EditorStatus::Failed("x".to_string()).tone().as_ref(),
            "text-destructive"
        );
        assert_eq!(EditorStatus::Invalid("Title".to_string()).message(), "Title");
        assert!(EditorStatus::Saving.is_busy());
        assert!(!EditorStatus::DraftSaved.is_busy());
    }

    #[tokio::test]
    async fn test_open_uses_server_copy_without_draft() {
        let h = harness(Some(7), note_7(AFTER_NOW));
        assert_eq!(h.session.open().await, Ok(ContentSource::Server));
        assert_eq!(*h.view.title.borrow(), "Groceries");
        assert_eq!(*h.view.text.borrow(), "Milk and eggs");
        assert!(!h.view.draft_restored.get());
        assert_eq!(h.view.last_status(), Some(EditorStatus::Idle));
    }

    #[tokio::test]
    async fn test_open_restores_newer_draft() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.drafts
            .save(&key(Some(7)), "Groceries", "Milk, eggs and bread")
            .expect("seed draft");

        assert_eq!(h.session.open().await, Ok(ContentSource::Draft));
        assert_eq!(h.session.text(), "Milk, eggs and bread");
        assert!(h.view.draft_restored.get());
        assert_eq!(h.view.last_status(), Some(EditorStatus::DraftRestored));
    }

    #[tokio::test]
    async fn test_open_ignores_older_draft() {
        let h = harness(Some(7), note_7(AFTER_NOW));
        h.drafts
            .save(&key(Some(7)), "old", "stale local text")
            .expect("seed draft");

        assert_eq!(h.session.open().await, Ok(ContentSource::Server));
        assert_eq!(h.session.text(), "Milk and eggs");
    }

    #[tokio::test]
    async fn test_open_new_note_restores_its_draft() {
        let h = harness(None, FakeNotes::default());
        h.drafts
            .save(&key(None), "Ideas", "Half-written thought")
            .expect("seed draft");

        assert_eq!(h.session.open().await, Ok(ContentSource::Draft));
        assert_eq!(*h.view.title.borrow(), "Ideas");
        assert_eq!(h.notes.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_open_missing_note_reports_not_found() {
        let h = harness(Some(9), FakeNotes::default());
        assert_eq!(h.session.open().await, Err(EditorError::NotFound));
        assert!(matches!(h.view.last_status(), Some(EditorStatus::Failed(_))));
    }

    #[tokio::test]
    async fn test_rapid_typing_issues_one_request() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");

        let mut text = String::from("Hello wor");
        for c in "ld th".chars() {
            text.push(c);
            h.session.on_text_input(&text);
            h.platform.advance(50);
        }
        h.platform.advance(300);
        assert_eq!(h.platform.queued_tasks(), 1);
        h.platform.run_tasks().await;

        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.session.suggestion(), "again");
        assert_eq!(*h.view.suggestion.borrow(), "again");
        assert!(h.provider.requests.borrow()[0]
            .prompt
            .contains("Hello world th"));
    }

    #[tokio::test]
    async fn test_boundary_and_word_delays() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");

        h.session.on_text_input("Hello world ");
        h.platform.advance(199);
        assert_eq!(h.platform.queued_tasks(), 0);
        h.platform.advance(1);
        assert_eq!(h.platform.queued_tasks(), 1);
        h.platform.run_tasks().await;

        h.session.on_text_input("Hello worl");
        h.platform.advance(249);
        assert_eq!(h.platform.queued_tasks(), 0);
        h.platform.advance(1);
        assert_eq!(h.platform.queued_tasks(), 1);
    }

    #[tokio::test]
    async fn test_short_text_never_fetches() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");

        h.session.on_text_input("Hi there");
        h.session.on_text_input("Hi ther");
        h.platform.advance(60_000);
        h.platform.run_tasks().await;

        assert_eq!(h.provider.calls(), 0);
        assert!(h.session.suggestion().is_empty());
    }

    #[tokio::test]
    async fn test_keystroke_clears_shown_suggestion() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        h.platform.run_tasks().await;
        assert_eq!(*h.view.suggestion.borrow(), "again");

        h.session.on_text_input("Hello world!");
        assert_eq!(*h.view.suggestion.borrow(), "");
        assert!(h.session.suggestion().is_empty());
    }

    #[tokio::test]
    async fn test_late_response_for_older_generation_is_ignored() {
        let h = harness_with(None, FakeNotes::default(), GatedProvider::default());
        h.session.open().await.expect("open");

        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        let mut first = h.platform.take_task().expect("first fetch");
        assert_eq!(poll_once(&mut first), Poll::Pending);

        h.session.on_text_input("Hello world!");
        h.platform.advance(200);
        let mut second = h.platform.take_task().expect("second fetch");
        assert_eq!(poll_once(&mut second), Poll::Pending);
        assert_eq!(h.provider.calls(), 2);

        h.provider.release(1, Ok("fresh".to_string()));
        assert_eq!(poll_once(&mut second), Poll::Ready(()));
        h.provider.release(0, Ok("stale".to_string()));
        assert_eq!(poll_once(&mut first), Poll::Ready(()));

        assert_eq!(h.session.suggestion(), "fresh");
        assert_eq!(*h.view.suggestion.borrow(), "fresh");
    }

    #[tokio::test]
    async fn test_accept_only_at_end_of_text() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        h.platform.run_tasks().await;

        assert!(!h.session.accept_suggestion(false));
        assert_eq!(h.session.text(), "Hello world");
        assert_eq!(h.session.suggestion(), "again");

        assert!(h.session.accept_suggestion(true));
        assert_eq!(h.session.text(), "Hello world again");
        assert_eq!(*h.view.text.borrow(), "Hello world again");
        assert!(h.session.suggestion().is_empty());

        // Nothing left to accept.
        assert!(!h.session.accept_suggestion(true));
    }

    #[tokio::test]
    async fn test_accept_rearms_after_settle_delay() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        h.platform.run_tasks().await;

        h.session.accept_suggestion(true);
        h.platform.advance(219);
        h.platform.advance(250);
        assert_eq!(h.platform.queued_tasks(), 0);
        h.platform.advance(1);
        assert_eq!(h.platform.queued_tasks(), 1);
        h.platform.run_tasks().await;

        assert_eq!(h.provider.calls(), 2);
        assert!(h.provider.requests.borrow()[1]
            .prompt
            .contains("Hello world again"));
    }

    #[tokio::test]
    async fn test_typing_writes_draft_after_debounce() {
        let h = harness(Some(7), note_7(AFTER_NOW));
        h.session.open().await.expect("open");

        h.session.on_title_input("Groceries!");
        h.session.on_text_input("Milk and eggs and jam");
        h.platform.advance(299);
        assert!(h.drafts.load(&key(Some(7))).is_none());
        h.platform.advance(1);

        let draft = h.drafts.load(&key(Some(7))).expect("draft written");
        assert_eq!(draft.title, "Groceries!");
        assert_eq!(draft.text, "Milk and eggs and jam");
        assert_eq!(draft.saved_ms, NOW + 300);
        assert!(h
            .view
            .statuses
            .borrow()
            .contains(&EditorStatus::DraftSaved));
    }

    #[tokio::test]
    async fn test_successful_save_clears_draft_and_leaves() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        h.session.on_text_input("Milk and eggs and jam");
        h.platform.advance(300);
        assert!(h.drafts.load(&key(Some(7))).is_some());

        let saved = h.session.save().await.expect("save");
        assert_eq!(saved.text, "Milk and eggs and jam");
        assert_eq!(
            h.notes.get(7).map(|n| n.text),
            Some("Milk and eggs and jam".to_string())
        );
        assert!(h.drafts.load(&key(Some(7))).is_none());
        assert_eq!(h.platform.navigations(), vec![NOTES_PATH.to_string()]);
        assert!(h.session.is_closed());
    }

    #[tokio::test]
    async fn test_save_of_new_note_creates_it() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.session.on_title_input("  Ideas  ");
        h.session.on_text_input("First idea ");

        let saved = h.session.save().await.expect("save");
        assert_eq!(saved.title, "Ideas");
        assert_eq!(saved.text, "First idea");
        assert_eq!(h.notes.len(), 1);

        // The pending draft write was dropped, not flushed.
        h.platform.advance(1_000);
        assert!(h.drafts.load(&key(None)).is_none());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft_and_stays() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        h.session.on_text_input("Milk and eggs and jam");
        h.platform.advance(300);

        h.notes
            .fail_next(ApiError::http(500, "Could not update the note"));
        let err = h.session.save().await.expect_err("save should fail");
        assert_eq!(
            err,
            EditorError::Network("Could not update the note (500)".to_string())
        );
        assert!(h.drafts.load(&key(Some(7))).is_some());
        assert!(h.platform.navigations().is_empty());
        assert_eq!(
            h.view.last_status(),
            Some(EditorStatus::Failed("Could not update the note (500)".to_string()))
        );
        assert!(!h.session.is_closed());
    }

    #[tokio::test]
    async fn test_validation_blocks_before_network() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");

        h.session.on_text_input("Some body text");
        assert!(matches!(
            h.session.save().await,
            Err(EditorError::Validation(_))
        ));

        h.session.on_title_input("Title");
        h.session.on_text_input("   ");
        assert!(matches!(
            h.session.save().await,
            Err(EditorError::Validation(_))
        ));
        assert!(matches!(h.view.last_status(), Some(EditorStatus::Invalid(_))));
        assert_eq!(h.notes.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_response_clears_token_and_redirects() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        h.session.on_title_input("Groceries");
        h.session.on_text_input("Milk and eggs and jam");

        h.notes.fail_next(ApiError::unauthorized());
        assert_eq!(h.session.save().await, Err(EditorError::AuthExpired));

        assert!(h.auth.load().is_none());
        assert_eq!(h.platform.navigations(), vec![LOGIN_PATH.to_string()]);
        assert!(h.session.is_closed());
        // Unsaved edits survive the redirect.
        assert!(h.drafts.load(&key(Some(7))).is_some());
        assert_eq!(h.platform.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_expired_credential_never_reaches_network() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        let calls = h.notes.calls.get();

        h.platform.advance(3_600_000);
        h.session.on_title_input("Groceries");
        h.session.on_text_input("Milk and eggs and jam");
        assert_eq!(h.session.save().await, Err(EditorError::AuthExpired));
        assert_eq!(h.notes.calls.get(), calls);
        assert_eq!(h.platform.navigations(), vec![LOGIN_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_unauthorized_completion_redirects() {
        let h = harness_with(
            None,
            FakeNotes::default(),
            ScriptedProvider::always("x").then(Err(ApiError::unauthorized())),
        );
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        h.platform.run_tasks().await;

        assert!(h.session.is_closed());
        assert_eq!(h.platform.navigations(), vec![LOGIN_PATH.to_string()]);
        assert_eq!(h.store.get_item(TOKEN_KEY), None);
    }

    #[tokio::test]
    async fn test_provider_failure_is_soft() {
        let h = harness_with(
            None,
            FakeNotes::default(),
            ScriptedProvider::always("again").then(Err(ApiError::http(503, "down"))),
        );
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        h.platform.run_tasks().await;

        assert!(h.session.suggestion().is_empty());
        assert!(h
            .view
            .statuses
            .borrow()
            .contains(&EditorStatus::SuggestionUnavailable));
        assert!(!h.session.is_closed());

        // Editing and later suggestions carry on.
        h.session.on_text_input("Hello world, again");
        h.platform.advance(250);
        h.platform.run_tasks().await;
        assert_eq!(h.session.suggestion(), "again");
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.store.reject_writes(true);

        h.session.on_text_input("Hello world");
        h.platform.advance(300);
        h.platform.run_tasks().await;

        assert!(h.drafts.load(&key(None)).is_none());
        assert!(!h
            .view
            .statuses
            .borrow()
            .contains(&EditorStatus::DraftSaved));
        assert_eq!(h.session.suggestion(), "again");
        assert!(!h.session.is_closed());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        h.drafts.save(&key(Some(7)), "t", "x").expect("seed draft");

        h.platform.answer_confirm(false);
        assert_eq!(h.session.delete().await, Ok(false));
        assert_eq!(h.notes.len(), 1);

        h.platform.answer_confirm(true);
        assert_eq!(h.session.delete().await, Ok(true));
        assert_eq!(h.notes.len(), 0);
        assert!(h.drafts.load(&key(Some(7))).is_none());
        assert_eq!(h.platform.navigations(), vec![NOTES_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_delete_failure_is_surfaced() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.session.open().await.expect("open");
        h.platform.answer_confirm(true);
        h.notes.fail_next(ApiError::not_found("Note not found"));

        assert_eq!(h.session.delete().await, Err(EditorError::NotFound));
        assert_eq!(h.view.last_status(), Some(EditorStatus::Failed("Note not found.".to_string())));
        assert!(h.platform.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_new_note_is_noop() {
        let h = harness(None, FakeNotes::default());
        h.platform.answer_confirm(true);
        assert_eq!(h.session.delete().await, Ok(false));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_existing_draft_alone() {
        let h = harness(Some(7), note_7(BEFORE_NOW));
        h.drafts
            .save(&key(Some(7)), "Groceries", "three paragraphs of unsaved work")
            .expect("seed draft");

        h.notes.fail_next(ApiError::http(503, "down"));
        assert_eq!(
            h.session.open().await,
            Err(EditorError::Network("down (503)".to_string()))
        );
        assert!(!h.session.is_loaded());
        assert!(!h.session.is_closed());

        // Keystrokes on the empty buffer must not replace the stored draft.
        h.session.on_title_input("G");
        h.session.on_text_input("o");
        h.platform.advance(300);
        h.session.flush_pending_draft();
        assert_eq!(
            h.drafts.load(&key(Some(7))).map(|d| d.text).as_deref(),
            Some("three paragraphs of unsaved work")
        );
        assert_eq!(h.session.save().await, Err(EditorError::NotLoaded));
        assert_eq!(h.notes.calls.get(), 1);

        // Retrying picks the draft back up.
        assert_eq!(h.session.open().await, Ok(ContentSource::Draft));
        assert!(h.session.is_loaded());
        assert_eq!(h.session.text(), "three paragraphs of unsaved work");
    }

    #[tokio::test]
    async fn test_background_work_cannot_unlock_a_save_in_flight() {
        let h = harness_with(
            None,
            FakeNotes::default(),
            ScriptedProvider::always("again")
                .then(Err(ApiError::http(503, "down")))
                .then(Err(ApiError::http(503, "down"))),
        );
        h.session.open().await.expect("open");
        h.session.on_title_input("Ideas");
        h.session.on_text_input("Hello world");
        h.platform.advance(250);
        assert_eq!(h.platform.queued_tasks(), 1);

        h.notes.hold_writes(true);
        let mut save = Box::pin(h.session.save());
        assert!(poll_once(&mut save).is_pending());
        assert_eq!(h.view.last_status(), Some(EditorStatus::Saving));

        // A fetch queued before the save, a failing one started during it,
        // and a debounced draft write all land while the request is pending.
        h.session.on_text_input("Hello world, more");
        h.platform.advance(300);
        h.platform.run_tasks().await;
        assert_eq!(h.view.last_status(), Some(EditorStatus::Saving));
        assert!(h.view.last_status().is_some_and(|s| s.is_busy()));

        // A second click does not issue a second create.
        assert_eq!(h.session.save().await, Err(EditorError::Busy));
        assert_eq!(h.notes.calls.get(), 1);

        h.notes.hold_writes(false);
        let saved = match poll_once(&mut save) {
            Poll::Ready(result) => result.expect("save"),
            Poll::Pending => panic!("save should have finished"),
        };
        assert_eq!(saved.title, "Ideas");
        assert_eq!(h.notes.len(), 1);
        assert_eq!(h.platform.navigations(), vec![NOTES_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_close_flushes_draft_and_silences_timers() {
        let h = harness(None, FakeNotes::default());
        h.session.open().await.expect("open");
        h.session.on_text_input("Hello world");

        h.session.close();
        assert_eq!(
            h.drafts.load(&key(None)).map(|d| d.text).as_deref(),
            Some("Hello world")
        );
        assert_eq!(h.platform.pending_timers(), 0);

        h.platform.advance(10_000);
        assert_eq!(h.platform.queued_tasks(), 0);
        h.session.on_text_input("ignored after close");
        assert_eq!(h.session.text(), "Hello world");
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let a = harness(None, FakeNotes::default());
        let b = harness(None, FakeNotes::default());
        a.session.open().await.expect("open");
        b.session.open().await.expect("open");

        a.session.on_text_input("Hello world");
        a.platform.advance(250);
        a.platform.run_tasks().await;

        assert_eq!(a.session.suggestion(), "again");
        assert!(b.session.suggestion().is_empty());
        assert_eq!(b.provider.calls(), 0);
    }
}
