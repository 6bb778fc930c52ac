use crate::api::NotesApi;
use crate::auth::{password_strength, AuthStore, PasswordStrength};
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Card, CardContent,
    CardDescription, CardFooter, CardGrid, CardHeader, CardTitle, Input, Label, Spinner,
};
use crate::drafts::DraftStore;
use crate::editor::{
    needs_separator, BrowserPlatform, EditorSession, EditorStatus, Platform, SessionDeps,
    SessionView,
};
use crate::models::{Note, NoteId};
use crate::state::AppContext;
use crate::storage::{KeyValueStore, LocalStorage};
use crate::util::{format_timestamp, word_count};
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::components::Redirect;
use leptos_router::params::Params;
use std::rc::Rc;
use wasm_bindgen::JsCast;

fn go_to(path: &str) {
    let _ = window().location().set_href(path);
}

#[component]
fn ErrorAlert(#[prop(into)] error: Signal<Option<String>>) -> impl IntoView {
    view! {
        <Show when=move || error.get().is_some() fallback=|| ().into_view()>
            <Alert class="border-destructive/30">
                <AlertDescription class="text-destructive text-xs">
                    {move || error.get().unwrap_or_default()}
                </AlertDescription>
            </Alert>
        </Show>
    }
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let email: RwSignal<String> = RwSignal::new(String::new());
    let password: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);

    let app_state = expect_context::<AppContext>();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let email_val = email.get();
        let password_val = password.get();
        let api_client = app_state.0.api_client.get_untracked();
        let state = app_state.0.clone();

        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.login(&email_val, &password_val).await {
                Ok(response) => match state.sign_in(response.token) {
                    Ok(()) => go_to("/notes"),
                    Err(e) => error.set(Some(e.to_string())),
                },
                Err(e) => error.set(Some(e.to_string())),
            }
            loading.set(false);
        });
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                <div class="mb-6 flex items-center justify-center">
                    <a href="/" class="text-sm font-medium text-foreground">"Notes AI"</a>
                </div>

                <Card>
                    <CardHeader>
                        <CardTitle class="text-lg">"Log in"</CardTitle>
                        <CardDescription class="text-xs">"Use your email or username and password."</CardDescription>
                    </CardHeader>

                    <CardContent>
                        <form class="flex flex-col gap-3" on:submit=on_submit>
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="email" class="text-xs">"Email or username"</Label>
                                <Input
                                    id="email"
                                    placeholder="you@example.com"
                                    bind_value=email
                                    required=true
                                    class="h-8 text-sm"
                                />
                            </div>

                            <div class="flex flex-col gap-1.5">
                                <Label html_for="password" class="text-xs">"Password"</Label>
                                <Input
                                    id="password"
                                    r#type="password"
                                    placeholder="••••••••"
                                    bind_value=password
                                    required=true
                                    class="h-8 text-sm"
                                />
                            </div>

                            <ErrorAlert error=error />

                            <Button
                                class="w-full"
                                size=ButtonSize::Sm
                                attr:disabled=move || loading.get()
                            >
                                <span class="inline-flex items-center gap-2">
                                    <Show when=move || loading.get() fallback=|| ().into_view()>
                                        <Spinner />
                                    </Show>
                                    {move || if loading.get() { "Signing in..." } else { "Continue" }}
                                </span>
                            </Button>

                            <div class="pt-1 text-xs text-muted-foreground">
                                "No account? "
                                <a class="text-primary underline underline-offset-4" href="/register">"Register"</a>
                            </div>
                        </form>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

#[component]
pub fn RegisterPage() -> impl IntoView {
    let email: RwSignal<String> = RwSignal::new(String::new());
    let username: RwSignal<String> = RwSignal::new(String::new());
    let password: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let success: RwSignal<bool> = RwSignal::new(false);

    let app_state = expect_context::<AppContext>();

    let strength = Memo::new(move |_| password_strength(&password.get()));
    let strength_class = move || match strength.get().1 {
        PasswordStrength::Weak => "bg-destructive",
        PasswordStrength::Medium => "bg-yellow-500",
        PasswordStrength::Strong => "bg-green-600",
    };

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let email_val = email.get();
        let username_val = username.get();
        let password_val = password.get();
        let api_client = app_state.0.api_client.get_untracked();

        loading.set(true);
        error.set(None);
        success.set(false);

        spawn_local(async move {
            match api_client
                .register(&email_val, &username_val, &password_val)
                .await
            {
                // The server hands back a token, but we ask the user to sign in.
                Ok(_response) => success.set(true),
                Err(e) => error.set(Some(e.to_string())),
            }
            loading.set(false);
        });
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                <Card>
                    <CardHeader>
                        <CardTitle class="text-lg">"Create an account"</CardTitle>
                        <CardDescription class="text-xs">
                            "Passwords need 8+ characters with upper and lower case, a digit and a symbol."
                        </CardDescription>
                    </CardHeader>

                    <CardContent>
                        <form class="flex flex-col gap-3" on:submit=on_submit>
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="email" class="text-xs">"Email"</Label>
                                <Input id="email" r#type="email" bind_value=email required=true class="h-8 text-sm" />
                            </div>

                            <div class="flex flex-col gap-1.5">
                                <Label html_for="username" class="text-xs">"Username"</Label>
                                <Input id="username" bind_value=username required=true class="h-8 text-sm" />
                            </div>

                            <div class="flex flex-col gap-1.5">
                                <Label html_for="password" class="text-xs">"Password"</Label>
                                <Input
                                    id="password"
                                    r#type="password"
                                    bind_value=password
                                    required=true
                                    class="h-8 text-sm"
                                />
                                <div class="h-1.5 w-full rounded bg-muted">
                                    <div
                                        class=move || format!("h-1.5 rounded transition-all {}", strength_class())
                                        style=move || format!("width: {}%", strength.get().0)
                                    ></div>
                                </div>
                                <div class="text-xs text-muted-foreground">
                                    {move || strength.get().1.to_string()}
                                </div>
                            </div>

                            <ErrorAlert error=error />

                            <Show when=move || success.get() fallback=|| ().into_view()>
                                <Alert class="border-green-600/30">
                                    <AlertDescription class="text-green-600 text-xs">
                                        "Registered. "
                                        <a class="underline underline-offset-4" href="/login">"Log in"</a>
                                    </AlertDescription>
                                </Alert>
                            </Show>

                            <Button class="w-full" size=ButtonSize::Sm attr:disabled=move || loading.get()>
                                {move || if loading.get() { "Registering..." } else { "Register" }}
                            </Button>

                            <div class="pt-1 text-xs text-muted-foreground">
                                "Already registered? "
                                <a class="text-primary underline underline-offset-4" href="/login">"Log in"</a>
                            </div>
                        </form>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

#[component]
fn AppHeader() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let display_name = move || {
        app_state
            .0
            .credential
            .with(|c| c.as_ref().and_then(|c| c.display_name().map(str::to_string)))
            .unwrap_or_default()
    };

    let state = app_state.0.clone();
    let on_logout = move |ev: web_sys::MouseEvent| {
        ev.prevent_default();
        state.logout();
        go_to("/login");
    };

    view! {
        <header class="flex items-center justify-between border-b px-4 py-3">
            <a href="/notes" class="text-sm font-semibold text-foreground">"Notes AI"</a>
            <div class="flex items-center gap-3 text-xs text-muted-foreground">
                <span>{display_name}</span>
                <a href="/login" class="underline underline-offset-4" on:click=on_logout>"Log out"</a>
            </div>
        </header>
    }
}

#[component]
pub fn RootAuthed(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let is_authenticated = move || app_state.0.is_authenticated();

    // Store children so the view macro sees an `Fn` (not an `FnOnce`).
    let children = StoredValue::new(children);

    view! {
        <Show when=is_authenticated fallback=|| view! { <Redirect path="/login" /> }>
            <div class="min-h-screen bg-background">
                <AppHeader />
                <main class="mx-auto w-full max-w-5xl px-4 py-6">
                    {move || children.with_value(|c| c())}
                </main>
            </div>
        </Show>
    }
}

#[component]
pub fn RootPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let is_authenticated = move || app_state.0.is_authenticated();

    view! {
        <Show when=is_authenticated fallback=|| view! { <Redirect path="/login" /> }>
            <Redirect path="/notes" />
        </Show>
    }
}

fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by_key(|n| std::cmp::Reverse(n.modified_ms()));
}

/// What a card in the notes list shows.
#[derive(Clone, Debug, PartialEq, Eq)]
struct NoteSummary {
    href: String,
    heading: String,
    preview: String,
    stamp: String,
}

impl From<Note> for NoteSummary {
    fn from(note: Note) -> Self {
        let modified = note.modified_ms();
        Self {
            href: format!("/note/{}", note.id),
            heading: note.display_title(),
            stamp: if modified > 0 { format_timestamp(modified) } else { String::new() },
            preview: note.text,
        }
    }
}

#[component]
pub fn NotesListPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let state = app_state.0.clone();

    let req_id = state.notes_request_id.get_untracked().saturating_add(1);
    state.notes_request_id.set(req_id);
    state.notes_loading.set(true);
    state.notes_error.set(None);

    let api_client = state.api_client.get_untracked();
    let loader = state.clone();
    spawn_local(async move {
        let result = api_client.list_notes().await;

        // Ignore stale responses.
        if loader.notes_request_id.get_untracked() != req_id {
            return;
        }

        match result {
            Ok(mut notes) => {
                sort_newest_first(&mut notes);
                loader.notes.set(notes);
            }
            Err(e) if e.is_unauthorized() => {
                loader.logout();
                go_to("/login");
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load notes");
                loader.notes_error.set(Some("Could not load notes.".to_string()));
            }
        }
        loader.notes_loading.set(false);
    });

    let notes = state.notes;
    let loading = state.notes_loading;
    let error = state.notes_error;

    view! {
        <div class="space-y-4">
            <div class="flex items-center justify-between">
                <h1 class="text-lg font-semibold">"My notes"</h1>
                <Button size=ButtonSize::Sm href="/note">"New note"</Button>
            </div>

            <ErrorAlert error=error />

            <Show when=move || loading.get() fallback=|| ().into_view()>
                <div class="flex items-center gap-2 text-xs text-muted-foreground">
                    <Spinner />
                    "Loading notes..."
                </div>
            </Show>

            <Show
                when=move || !loading.get() && error.get().is_none() && notes.with(|n| n.is_empty())
                fallback=|| ().into_view()
            >
                <div class="text-sm text-muted-foreground">"No notes yet. Create the first one."</div>
            </Show>

            <CardGrid>
                <For
                    each=move || notes.get()
                    key=|n| n.id
                    children=move |note: Note| {
                        let NoteSummary { href, heading, preview, stamp } = NoteSummary::from(note);
                        view! {
                            <a href=href class="block">
                                <Card class="h-full py-4 transition-colors hover:border-primary/50">
                                    <CardHeader class="px-4">
                                        <CardTitle class="text-base">{heading}</CardTitle>
                                    </CardHeader>
                                    <CardContent class="px-4">
                                        <p class="line-clamp-3 text-sm text-muted-foreground">{preview}</p>
                                    </CardContent>
                                    <CardFooter class="px-4 text-xs text-muted-foreground">
                                        <span>{stamp}</span>
                                    </CardFooter>
                                </Card>
                            </a>
                        }
                    }
                />
            </CardGrid>
        </div>
    }
}

#[derive(Params, PartialEq, Clone, Debug)]
pub struct NoteRouteParams {
    pub id: Option<String>,
}

/// Pushes session state into the page's signals.
#[derive(Clone, Copy)]
struct SignalView {
    title: RwSignal<String>,
    text: RwSignal<String>,
    suggestion: RwSignal<String>,
    status: RwSignal<EditorStatus>,
    draft_restored: RwSignal<bool>,
}

impl SessionView for SignalView {
    fn fields_loaded(&self, title: &str, text: &str) {
        self.title.set(title.to_string());
        self.text.set(text.to_string());
    }

    fn text_changed(&self, text: &str) {
        self.text.set(text.to_string());
    }

    fn suggestion_changed(&self, suggestion: &str) {
        self.suggestion.set(suggestion.to_string());
    }

    fn status_changed(&self, status: &EditorStatus) {
        self.status.set(status.clone());
    }

    fn draft_restored(&self, restored: bool) {
        self.draft_restored.set(restored);
    }
}

fn caret_at_end(ta: &web_sys::HtmlTextAreaElement) -> bool {
    // Selection offsets are UTF-16 code units.
    let len = ta.value().encode_utf16().count() as u32;
    matches!(
        (ta.selection_start(), ta.selection_end()),
        (Ok(Some(start)), Ok(Some(end))) if start == len && end == len
    )
}

#[component]
pub fn NoteEditorPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = leptos_router::hooks::use_params::<NoteRouteParams>();

    let raw_id = params.get_untracked().ok().and_then(|p| p.id);
    let note_id = raw_id.as_deref().map(str::parse::<NoteId>);
    let Some(credential) = app_state.0.credential.get_untracked() else {
        return view! { <Redirect path="/login" /> }.into_any();
    };
    let note_id = match note_id {
        Some(Ok(id)) => Some(id),
        None => None,
        Some(Err(_)) => {
            return view! {
                <Alert class="border-destructive/30">
                    <AlertDescription class="text-destructive text-xs">"Note not found."</AlertDescription>
                </Alert>
            }
            .into_any();
        }
    };

    let title: RwSignal<String> = RwSignal::new(String::new());
    let text: RwSignal<String> = RwSignal::new(String::new());
    let suggestion: RwSignal<String> = RwSignal::new(String::new());
    let status: RwSignal<EditorStatus> = RwSignal::new(EditorStatus::Idle);
    let draft_restored: RwSignal<bool> = RwSignal::new(false);
    let opening: RwSignal<bool> = RwSignal::new(true);
    let loaded: RwSignal<bool> = RwSignal::new(false);

    let editor_ref: NodeRef<html::Textarea> = NodeRef::new();
    let ghost_ref: NodeRef<html::Div> = NodeRef::new();

    let api = Rc::new(app_state.0.api_client.get_untracked());
    let platform: Rc<dyn Platform> = Rc::new(BrowserPlatform);
    let store: Rc<dyn KeyValueStore> = Rc::new(LocalStorage);
    let session = EditorSession::new(
        note_id,
        credential,
        SessionDeps {
            api: api.clone(),
            provider: api,
            drafts: DraftStore::new(store.clone(), Rc::new(BrowserPlatform)),
            auth: AuthStore::new(store),
            platform,
            view: Rc::new(SignalView {
                title,
                text,
                suggestion,
                status,
                draft_restored,
            }),
            config: app_state.0.config.suggest.clone(),
        },
    );
    let session = StoredValue::new_local(session);

    // The editor stays locked until the content is reconciled; a failed load can be retried.
    let load = move || {
        opening.set(true);
        spawn_local(async move {
            let Some(s) = session.try_get_value() else {
                return;
            };
            if let Err(e) = s.open().await {
                tracing::warn!(error = %e, "note did not open");
            }
            loaded.set(s.is_loaded());
            opening.set(false);
        });
    };
    load();

    // Keep unsaved edits when the tab goes away mid-debounce.
    let pagehide = window_event_listener(ev::pagehide, move |_| {
        session.try_with_value(|s| s.flush_pending_draft());
    });
    on_cleanup(move || {
        pagehide.remove();
        session.try_with_value(|s| s.close());
    });

    let sync_scroll = move || {
        if let (Some(ta), Some(ghost)) = (editor_ref.get_untracked(), ghost_ref.get_untracked()) {
            ghost.set_scroll_top(ta.scroll_top());
            ghost.set_scroll_left(ta.scroll_left());
        }
    };

    let on_input = move |ev: web_sys::Event| {
        let Some(ta) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlTextAreaElement>().ok())
        else {
            return;
        };
        let v = ta.value();
        text.set(v.clone());
        session.with_value(|s| s.on_text_input(&v));
        sync_scroll();
    };

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        if ev.key() != "Tab" || suggestion.with_untracked(|s| s.is_empty()) {
            return;
        }
        ev.prevent_default();
        let Some(ta) = editor_ref.get_untracked() else {
            return;
        };
        let accepted = session.with_value(|s| s.accept_suggestion(caret_at_end(&ta)));
        if accepted {
            let v = session.with_value(|s| s.text());
            ta.set_value(&v);
            let end = v.encode_utf16().count() as u32;
            let _ = ta.set_selection_range(end, end);
            sync_scroll();
        }
    };

    let on_title = Callback::new(move |v: String| {
        session.with_value(|s| s.on_title_input(&v));
    });

    let on_save = move |_| {
        spawn_local(async move {
            let Some(s) = session.try_get_value() else {
                return;
            };
            if let Err(e) = s.save().await {
                tracing::debug!(error = %e, "save not completed");
            }
        });
    };

    let on_delete = move |_| {
        spawn_local(async move {
            let Some(s) = session.try_get_value() else {
                return;
            };
            if let Err(e) = s.delete().await {
                tracing::debug!(error = %e, "delete not completed");
            }
        });
    };

    let locked = move || opening.get() || !loaded.get();
    let busy = move || locked() || status.with(|s| s.is_busy());
    let heading = if note_id.is_some() { "Edit note" } else { "New note" };

    view! {
        <div class="space-y-4">
            <div class="flex items-center justify-between gap-2">
                <h1 class="text-lg font-semibold">{heading}</h1>
                <div class="flex items-center gap-2">
                    <Show when=move || note_id.is_some() fallback=|| ().into_view()>
                        <Button
                            variant=ButtonVariant::Destructive
                            size=ButtonSize::Sm
                            attr:disabled=busy
                            on:click=on_delete
                        >
                            "Delete"
                        </Button>
                    </Show>
                    <Button size=ButtonSize::Sm attr:disabled=busy on:click=on_save>
                        <span class="inline-flex items-center gap-2">
                            <Show when=move || status.with(|s| s.is_busy()) fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            "Save"
                        </span>
                    </Button>
                </div>
            </div>

            <Show when=move || !opening.get() && !loaded.get() fallback=|| ().into_view()>
                <div class="flex items-center gap-2">
                    <Button variant=ButtonVariant::Outline size=ButtonSize::Sm on:click=move |_| load()>
                        "Retry"
                    </Button>
                </div>
            </Show>

            <Show when=move || draft_restored.get() fallback=|| ().into_view()>
                <Alert class="border-green-600/30">
                    <AlertDescription class="text-xs">
                        "A local draft newer than the saved note was restored. Save to keep it."
                    </AlertDescription>
                </Alert>
            </Show>

            <Input
                bind_value=title
                on_value=on_title
                placeholder="Title"
                attr:disabled=locked
                class="h-10 text-lg font-semibold"
            />

            <div class="relative h-[60vh]">
                <div
                    node_ref=ghost_ref
                    aria-hidden="true"
                    class="pointer-events-none absolute inset-0 overflow-hidden whitespace-pre-wrap break-words rounded-md border border-transparent px-3 py-2 font-mono text-sm"
                >
                    <span class="text-transparent">{move || text.get()}</span>
                    {move || {
                        let s = suggestion.get();
                        if s.is_empty() {
                            return None;
                        }
                        let sep = if text.with(|t| needs_separator(t, &s)) { " " } else { "" };
                        Some(view! {
                            <span class="text-muted-foreground">{format!("{sep}{s} ⇥TAB")}</span>
                        })
                    }}
                </div>
                <textarea
                    node_ref=editor_ref
                    class="relative h-full w-full resize-none rounded-md border border-input bg-transparent px-3 py-2 font-mono text-sm outline-none focus-visible:border-ring focus-visible:ring-2 focus-visible:ring-ring/50"
                    placeholder="Start writing..."
                    prop:value=move || text.get()
                    prop:disabled=locked
                    on:input=on_input
                    on:keydown=on_keydown
                    on:scroll=move |_| sync_scroll()
                ></textarea>
            </div>

            <div class="flex items-center justify-between text-xs">
                <p class=move || format!("text-sm {}", status.with(|s| s.tone().as_ref().to_string()))>
                    {move || status.with(|s| s.message().to_string())}
                </p>
                <span class="text-muted-foreground">
                    {move || format!("{} words", word_count(&text.get()))}
                </span>
            </div>
        </div>
    }
    .into_any()
}
