use crate::drafts::Draft;
use crate::models::Note;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContentSource {
    Draft,
    Server,
    /// New note, nothing stored locally.
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub source: ContentSource,
    pub title: String,
    pub text: String,
}

/// Pick what the editor opens with. Made once per screen; later edits only refresh the draft.
///
/// A draft wins over the server copy only when it is strictly newer, or when
/// the server row carries no usable timestamp.
pub(crate) fn reconcile(draft: Option<&Draft>, server: Option<&Note>) -> Reconciled {
    let use_draft = match (draft, server) {
        (Some(_), None) => true,
        (Some(d), Some(note)) => {
            let server_ms = note.modified_ms();
            server_ms == 0 || d.saved_ms > server_ms
        }
        (None, _) => false,
    };

    match (draft, server) {
        (Some(d), _) if use_draft => Reconciled {
            source: ContentSource::Draft,
            title: d.title.clone(),
            text: d.text.clone(),
        },
        (_, Some(note)) => Reconciled {
            source: ContentSource::Server,
            title: note.title.clone(),
            text: note.text.clone(),
        },
        _ => Reconciled {
            source: ContentSource::None,
            title: String::new(),
            text: String::new(),
        },
    }
}
