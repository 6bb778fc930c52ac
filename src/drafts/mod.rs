mod note;

pub(crate) use note::{Draft, DraftKey, DraftStore};
