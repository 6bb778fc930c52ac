use crate::util::{now_ms, Clock};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

pub(crate) type TimerId = i32;

pub(crate) type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// Host services the editor engine needs from the UI thread.
pub(crate) trait Platform: Clock {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId;
    fn clear_timeout(&self, id: TimerId);
    fn spawn(&self, task: LocalTask);
    fn navigate(&self, path: &str);
    fn confirm(&self, message: &str) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BrowserPlatform;

impl Clock for BrowserPlatform {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

impl Platform for BrowserPlatform {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        let Some(win) = web_sys::window() else {
            return 0;
        };

        let cb = Closure::once_into_js(move || callback());
        win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            delay_ms.min(i32::MAX as u32) as i32,
        )
        .unwrap_or(0)
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(win) = web_sys::window() {
            win.clear_timeout_with_handle(id);
        }
    }

    fn spawn(&self, task: LocalTask) {
        leptos::task::spawn_local(task);
    }

    fn navigate(&self, path: &str) {
        if let Some(win) = web_sys::window() {
            let _ = win.location().set_href(path);
        }
    }

    fn confirm(&self, message: &str) -> bool {
        web_sys::window()
            .and_then(|w| w.confirm_with_message(message).ok())
            .unwrap_or(false)
    }
}

/// Single-slot timer: scheduling replaces whatever was pending.
///
/// A replaced callback never runs, even if the host fires it anyway.
pub(crate) struct Debouncer {
    platform: Rc<dyn Platform>,
    seq: Rc<Cell<u64>>,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl Debouncer {
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self {
            platform,
            seq: Rc::new(Cell::new(0)),
            pending: Rc::new(Cell::new(None)),
        }
    }

    pub fn schedule(&self, delay_ms: u32, f: impl FnOnce() + 'static) {
        self.cancel();

        let seq = self.seq.get();
        let current = self.seq.clone();
        let pending = self.pending.clone();
        let id = self.platform.set_timeout(
            delay_ms,
            Box::new(move || {
                if current.get() != seq {
                    return;
                }
                pending.set(None);
                f();
            }),
        );
        self.pending.set(Some(id));
    }

    pub fn cancel(&self) {
        self.seq.set(self.seq.get().wrapping_add(1));
        if let Some(id) = self.pending.take() {
            self.platform.clear_timeout(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}
