use super::cache::{snippet_of, SuggestionCache};
use crate::api::{CompletionProvider, CompletionRequest};
use crate::config::SuggestConfig;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one issued suggestion request. Only the newest may be applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Generation(u64);

/// Cooperative cancellation flag shared with one in-flight call.
///
/// The transport is never aborted; a cancelled call runs to completion and its
/// result is dropped.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    Suggestion(String),
    Cancelled,
    Failed(String),
    /// The provider rejected the credential.
    AuthExpired,
}

pub(crate) fn build_prompt(text: &str, title: &str, cfg: &SuggestConfig) -> String {
    let tail = snippet_of(text, cfg.max_context_chars);
    let title: String = title.chars().take(cfg.max_title_chars).collect();

    let mut prompt = String::with_capacity(tail.len() + title.len() + 96);
    if !title.is_empty() {
        prompt.push_str("Title: ");
        prompt.push_str(&title);
        prompt.push('\n');
    }
    prompt.push_str("Note (final part):\n");
    prompt.push_str(tail);
    prompt.push_str("\n\nContinue the text briefly, coherently and in keeping with the title.");
    prompt
}

/// One editor's view of the completion provider: the snippet cache, the
/// generation counter and the single in-flight call.
pub(crate) struct SuggestionFetcher<P> {
    provider: Rc<P>,
    config: SuggestConfig,
    cache: RefCell<SuggestionCache>,
    generation: Cell<u64>,
    in_flight: RefCell<Option<CancelToken>>,
}

impl<P: CompletionProvider> SuggestionFetcher<P> {
    pub fn new(provider: Rc<P>, config: SuggestConfig) -> Self {
        Self {
            provider,
            config,
            cache: RefCell::new(SuggestionCache::default()),
            generation: Cell::new(0),
            in_flight: RefCell::new(None),
        }
    }

    /// Start a new generation and cancel whatever call is still outstanding.
    pub fn supersede(&self) -> Generation {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        if let Some(token) = self.in_flight.borrow_mut().take() {
            token.cancel();
        }
        Generation(next)
    }

    pub fn current(&self) -> Generation {
        Generation(self.generation.get())
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }

    pub async fn request(&self, text: &str, title: &str, generation: Generation) -> FetchOutcome {
        let snippet = snippet_of(text, self.config.max_context_chars).to_string();

        let hit = self.cache.borrow().get(&snippet).map(str::to_string);
        if let Some(hit) = hit {
            tracing::debug!(generation = generation.0, "suggestion cache hit");
            return if self.is_current(generation) {
                FetchOutcome::Suggestion(hit)
            } else {
                FetchOutcome::Cancelled
            };
        }

        let token = CancelToken::default();
        if let Some(prev) = self.in_flight.borrow_mut().replace(token.clone()) {
            prev.cancel();
        }

        let request = CompletionRequest {
            prompt: build_prompt(text, title, &self.config),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let result = self.provider.complete(&request).await;

        if token.is_cancelled() {
            tracing::debug!(generation = generation.0, "dropping cancelled suggestion");
            return FetchOutcome::Cancelled;
        }
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if in_flight.as_ref().is_some_and(|t| Rc::ptr_eq(&t.0, &token.0)) {
                *in_flight = None;
            }
        }

        match result {
            Ok(suggestion) => {
                let suggestion = suggestion.trim().to_string();
                self.cache.borrow_mut().put(snippet, suggestion.clone());
                if self.is_current(generation) {
                    FetchOutcome::Suggestion(suggestion)
                } else {
                    tracing::debug!(
                        generation = generation.0,
                        current = self.generation.get(),
                        "discarding stale suggestion"
                    );
                    FetchOutcome::Cancelled
                }
            }
            Err(e) if e.is_unauthorized() => FetchOutcome::AuthExpired,
            Err(e) => {
                tracing::warn!(error = %e, "completion provider failed");
                FetchOutcome::Failed(e.to_string())
            }
        }
    }
}
