use crate::models::{Note, NoteId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    NotFound,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub(crate) fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub(crate) fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{} ({status})", message.into()),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct NoteRequest {
    pub title: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct UpdateNoteResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub note: Note,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Vec<FieldError>>,
}

#[derive(Deserialize, Debug)]
struct FieldError {
    #[serde(default)]
    field: String,
    #[serde(default)]
    message: String,
}

/// Human-readable message from an error body: schema errors as `field: message` pairs,
/// else the `error` string, else `fallback`.
pub(crate) fn error_message(body: &str, fallback: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        return errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join(", ");
    }
    parsed
        .error
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Owner-scoped note records. The server derives the owner from the bearer token.
pub(crate) trait NotesApi {
    async fn get_note(&self, id: NoteId) -> ApiResult<Note>;
    async fn list_notes(&self) -> ApiResult<Vec<Note>>;
    async fn create_note(&self, title: &str, text: &str) -> ApiResult<Note>;
    async fn update_note(&self, id: NoteId, title: &str, text: &str) -> ApiResult<Note>;
    async fn delete_note(&self, id: NoteId) -> ApiResult<()>;
}

/// Remote text continuation.
pub(crate) trait CompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult<String>;
}

#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub(crate) fn get_auth_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn get_auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        auth_header: Option<String>,
    ) -> reqwest::RequestBuilder {
        if let Some(header) = auth_header {
            req = req.header("Authorization", header);
        }
        req
    }

    async fn request_api<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&impl Serialize>,
        ctx: &str,
    ) -> ApiResult<T> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.request(method, url);
        req = Self::with_auth_headers(req, self.get_auth_header());

        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;
        let status = res.status();

        if status.is_success() {
            return res.json().await.map_err(ApiError::parse);
        }

        let body = res.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(ApiError::unauthorized()),
            404 => Err(ApiError::not_found(error_message(&body, ctx))),
            code => Err(ApiError::http(code, error_message(&body, ctx))),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        let req = CredentialsRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        match self
            .request_api(reqwest::Method::POST, "/api/login", Some(&req), "Login failed")
            .await
        {
            // A 401 here means bad credentials, not an expired session.
            Err(e) if e.is_unauthorized() => Err(ApiError {
                kind: ApiErrorKind::Http,
                message: "Invalid credentials".to_string(),
            }),
            other => other,
        }
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> ApiResult<AuthResponse> {
        let req = RegisterRequest {
            email: email.trim().to_lowercase(),
            username: username.trim().to_lowercase(),
            password: password.to_string(),
        };
        self.request_api(
            reqwest::Method::POST,
            "/api/register",
            Some(&req),
            "Registration failed",
        )
        .await
    }
}

impl NotesApi for ApiClient {
    async fn get_note(&self, id: NoteId) -> ApiResult<Note> {
        self.request_api(
            reqwest::Method::GET,
            &format!("/api/notes/{id}"),
            None::<&()>,
            "Note not found",
        )
        .await
    }

    async fn list_notes(&self) -> ApiResult<Vec<Note>> {
        self.request_api(
            reqwest::Method::GET,
            "/api/notes",
            None::<&()>,
            "Could not load notes",
        )
        .await
    }

    async fn create_note(&self, title: &str, text: &str) -> ApiResult<Note> {
        let req = NoteRequest {
            title: title.to_string(),
            text: text.to_string(),
        };
        self.request_api(
            reqwest::Method::POST,
            "/api/notes",
            Some(&req),
            "Could not create the note",
        )
        .await
    }

    async fn update_note(&self, id: NoteId, title: &str, text: &str) -> ApiResult<Note> {
        let req = NoteRequest {
            title: title.to_string(),
            text: text.to_string(),
        };
        let res: UpdateNoteResponse = self
            .request_api(
                reqwest::Method::PUT,
                &format!("/api/notes/{id}"),
                Some(&req),
                "Could not update the note",
            )
            .await?;
        Ok(res.note)
    }

    async fn delete_note(&self, id: NoteId) -> ApiResult<()> {
        let _: serde_json::Value = self
            .request_api(
                reqwest::Method::DELETE,
                &format!("/api/notes/{id}"),
                None::<&()>,
                "Could not delete the note",
            )
            .await?;
        Ok(())
    }
}

impl CompletionProvider for ApiClient {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult<String> {
        let res: CompletionResponse = self
            .request_api(
                reqwest::Method::POST,
                "/api/ai/complete",
                Some(request),
                "Completion unavailable",
            )
            .await?;
        Ok(res.suggestion.unwrap_or_default())
    }
}
