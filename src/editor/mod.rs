//! Editing-screen engine: inline suggestions, local drafts and their reconciliation
//! against the server copy of a note.
//!
//! Everything here is target-independent. Browser specifics sit behind
//! [`Platform`], [`crate::storage::KeyValueStore`] and the API traits.

mod cache;
mod error;
mod fetcher;
mod platform;
mod reconcile;
mod scheduler;
mod session;

#[cfg(test)]
mod testing;

pub(crate) use platform::{BrowserPlatform, Platform};
pub(crate) use session::{needs_separator, EditorSession, EditorStatus, SessionDeps, SessionView};
