use crate::pages::{
    LoginPage, NoteEditorPage, NotesListPage, RegisterPage, RootAuthed, RootPage,
};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    provide_context(AppContext(AppState::new()));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("login") view=LoginPage />
                <Route path=path!("register") view=RegisterPage />
                <Route path=path!("notes") view=move || view! {
                    <RootAuthed>
                        <NotesListPage />
                    </RootAuthed>
                } />
                <Route path=path!("note") view=move || view! {
                    <RootAuthed>
                        <NoteEditorPage />
                    </RootAuthed>
                } />
                <Route path=path!("note/:id") view=move || view! {
                    <RootAuthed>
                        <NoteEditorPage />
                    </RootAuthed>
                } />
                <Route path=path!("") view=RootPage />
            </Routes>
        </Router>
    }
}
