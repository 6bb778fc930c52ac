use crate::models::NoteId;
use crate::storage::{load_json, save_json, KeyValueStore, StorageError};
use crate::util::Clock;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// One draft slot per user and note; `note_id: None` is the "new note" screen.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct DraftKey {
    pub user_id: String,
    pub note_id: Option<NoteId>,
}

impl DraftKey {
    pub fn new(user_id: impl Into<String>, note_id: Option<NoteId>) -> Self {
        Self {
            user_id: user_id.into(),
            note_id,
        }
    }

    fn storage_key(&self) -> String {
        match self.note_id {
            Some(id) => format!("notes_ai_draft::{}::{}", self.user_id, id),
            None => format!("notes_ai_draft::{}::new", self.user_id),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Draft {
    #[serde(default)]
    pub note_id: Option<NoteId>,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub saved_ms: i64,
}

#[derive(Clone)]
pub(crate) struct DraftStore {
    store: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
}

impl DraftStore {
    pub fn new(store: Rc<dyn KeyValueStore>, clock: Rc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Overwrite the slot, stamped with the current time.
    pub fn save(&self, key: &DraftKey, title: &str, text: &str) -> Result<Draft, StorageError> {
        let draft = Draft {
            note_id: key.note_id,
            user_id: key.user_id.clone(),
            title: title.to_string(),
            text: text.to_string(),
            saved_ms: self.clock.now_ms(),
        };
        save_json(self.store.as_ref(), &key.storage_key(), &draft)?;
        Ok(draft)
    }

    /// Missing and unreadable slots both load as `None`.
    pub fn load(&self, key: &DraftKey) -> Option<Draft> {
        load_json::<Draft>(self.store.as_ref(), &key.storage_key())
    }

    pub fn clear(&self, key: &DraftKey) {
        self.store.remove_item(&key.storage_key());
    }
}
