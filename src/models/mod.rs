use crate::util::parse_timestamp_ms;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-side note id (`notes.id`, a bigint).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub(crate) struct NoteId(pub i64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(NoteId)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Note {
    pub id: NoteId,

    /// Owner id. Numeric or uuid depending on the users table.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub created_at: Option<String>,

    /// Missing on freshly created rows; `created_at` stands in.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Note {
    /// Last-modified time in ms since the epoch, or 0 when the row carries no timestamps.
    pub fn modified_ms(&self) -> i64 {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp_ms)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp_ms))
            .unwrap_or(0)
    }

    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            format!("Note #{}", self.id)
        } else {
            self.title.clone()
        }
    }
}

/// Accept `"abc"`, `42` or `null` for id-like fields.
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
