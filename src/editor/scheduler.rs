use super::platform::{Debouncer, Platform};
use crate::config::SuggestConfig;
use std::cell::RefCell;
use std::rc::Rc;

/// Whitespace or terminal punctuation: a natural pause in typing.
pub(crate) fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SchedulerPlan {
    /// Too short to be worth a completion.
    Skip,
    After { delay_ms: u32 },
}

/// Decides when a keystroke turns into a completion request.
pub(crate) struct SuggestionScheduler {
    min_chars: usize,
    word_delay_ms: u32,
    boundary_delay_ms: u32,
    timer: Debouncer,
    last_query: RefCell<Option<String>>,
}

impl SuggestionScheduler {
    pub fn new(cfg: &SuggestConfig, platform: Rc<dyn Platform>) -> Self {
        Self {
            min_chars: cfg.min_chars,
            word_delay_ms: cfg.word_delay_ms,
            boundary_delay_ms: cfg.boundary_delay_ms,
            timer: Debouncer::new(platform),
            last_query: RefCell::new(None),
        }
    }

    pub fn plan(&self, text: &str) -> SchedulerPlan {
        if text.chars().count() < self.min_chars {
            return SchedulerPlan::Skip;
        }
        let delay_ms = match text.chars().next_back() {
            Some(c) if is_boundary(c) => self.boundary_delay_ms,
            _ => self.word_delay_ms,
        };
        SchedulerPlan::After { delay_ms }
    }

    /// Drop the pending timer and arm a new one for `text`, if it qualifies.
    pub fn on_text_changed(&self, text: &str, on_elapsed: impl FnOnce() + 'static) -> SchedulerPlan {
        self.timer.cancel();
        let plan = self.plan(text);
        if let SchedulerPlan::After { delay_ms } = plan {
            tracing::debug!(delay_ms, "suggestion scheduled");
            self.timer.schedule(delay_ms, on_elapsed);
        }
        plan
    }

    /// Whether an elapsed timer should go on to fetch.
    ///
    /// Refuses only when `text` was the last query and its suggestion is still showing.
    pub fn take_query(&self, text: &str, has_suggestion: bool) -> bool {
        let mut last = self.last_query.borrow_mut();
        if has_suggestion && last.as_deref() == Some(text) {
            return false;
        }
        *last = Some(text.to_string());
        true
    }

    pub fn cancel(&self) {
        self.timer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }
}
