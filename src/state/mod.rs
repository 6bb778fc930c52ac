use crate::api::ApiClient;
use crate::auth::{AuthStore, Credential};
use crate::config::EnvConfig;
use crate::models::Note;
use crate::storage::{LocalStorage, StorageError};
use crate::util::now_ms;
use leptos::prelude::*;
use std::rc::Rc;

pub(crate) fn auth_store() -> AuthStore {
    AuthStore::new(Rc::new(LocalStorage))
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: EnvConfig,
    pub api_client: RwSignal<ApiClient>,
    pub credential: RwSignal<Option<Credential>>,

    /// Owned notes, newest first.
    pub notes: RwSignal<Vec<Note>>,
    pub notes_loading: RwSignal<bool>,
    pub notes_error: RwSignal<Option<String>>,

    /// Notes load guard (ignore stale responses).
    pub notes_request_id: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::new();
        let auth = auth_store();

        // An expired token is as good as none; drop it before anything uses it.
        let credential = match auth.load() {
            Some(c) if c.is_expired(now_ms()) => {
                tracing::info!("stored credential expired");
                auth.clear();
                None
            }
            other => other,
        };

        let mut api_client = ApiClient::new(config.api_url.clone());
        if let Some(c) = &credential {
            api_client.set_token(c.token().to_string());
        }

        Self {
            config,
            api_client: RwSignal::new(api_client),
            credential: RwSignal::new(credential),
            notes: RwSignal::new(vec![]),
            notes_loading: RwSignal::new(false),
            notes_error: RwSignal::new(None),
            notes_request_id: RwSignal::new(0),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.with(|c| c.is_some())
    }

    pub fn sign_in(&self, token: String) -> Result<(), StorageError> {
        let Some(credential) = Credential::from_token(token) else {
            return Err(StorageError::Encode("empty token".to_string()));
        };
        auth_store().save(&credential)?;
        self.api_client
            .update(|c| c.set_token(credential.token().to_string()));
        self.credential.set(Some(credential));
        Ok(())
    }

    pub fn logout(&self) {
        auth_store().clear();
        self.api_client.update(|c| c.clear_token());
        self.credential.set(None);
        self.notes.set(vec![]);
        self.notes_error.set(None);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
