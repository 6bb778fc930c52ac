use wasm_bindgen::JsValue;

/// Tuning for the inline suggestion engine and draft autosave.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SuggestConfig {
    /// Texts shorter than this (in chars) never trigger a completion request.
    pub min_chars: usize,
    /// Debounce after a keystroke that ends mid-word.
    pub word_delay_ms: u32,
    /// Debounce after whitespace or terminal punctuation.
    pub boundary_delay_ms: u32,
    /// Trailing context sent to the provider; also the cache key length.
    pub max_context_chars: usize,
    pub max_title_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub draft_delay_ms: u32,
    /// Pause after accepting a suggestion before asking for the next one.
    pub accept_settle_ms: u32,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_chars: 8,
            word_delay_ms: 250,
            boundary_delay_ms: 200,
            max_context_chars: 700,
            max_title_chars: 120,
            max_tokens: 22,
            temperature: 0.6,
            draft_delay_ms: 300,
            accept_settle_ms: 220,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
    pub log_filter: String,
    pub suggest: SuggestConfig,
}

fn env_value(env: &JsValue, keys: &[&str]) -> Option<JsValue> {
    keys.iter().find_map(|k| {
        js_sys::Reflect::get(env, &JsValue::from_str(k))
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null())
    })
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            api_url: default_api_url(),
            log_filter: "info".to_string(),
            suggest: SuggestConfig::default(),
        };

        let Some(env) = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .map(JsValue::from)
            .filter(|env| env.is_object())
        else {
            return cfg;
        };

        // We support BOTH `window.ENV.API_URL` (documented) and `window.ENV.api_url`.
        if let Some(url) = env_value(&env, &["API_URL", "api_url"]).and_then(|v| v.as_string()) {
            cfg.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(filter) = env_value(&env, &["LOG_LEVEL"]).and_then(|v| v.as_string()) {
            cfg.log_filter = filter;
        }
        if let Some(n) = env_value(&env, &["SUGGEST_MIN_CHARS"]).and_then(|v| v.as_f64()) {
            cfg.suggest.min_chars = n.max(1.0) as usize;
        }
        if let Some(n) = env_value(&env, &["SUGGEST_DEBOUNCE_MS"]).and_then(|v| v.as_f64()) {
            cfg.suggest.word_delay_ms = n.max(0.0) as u32;
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The API is served from the same origin as the pages.
fn default_api_url() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string())
}
