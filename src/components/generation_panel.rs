use leptos::{prelude::*, task::spawn_local};
use log::{debug, info};
use serde_json::Value;

use crate::components::toast::Toast;
use crate::generation::{GenerationSession, GenerationState, RunId, RunPhase};
use crate::transport::{notify_server_cancel, open_event_stream};

/// Drives generation runs against one streaming endpoint and mirrors the
/// active run's state into a signal.
#[derive(Clone, Copy)]
pub struct GenerationController {
    endpoint: &'static str,
    pub state: RwSignal<GenerationState>,
    session: StoredValue<GenerationSession>,
    latest: StoredValue<Option<(RunId, String)>>,
}

impl GenerationController {
    pub fn new(endpoint: &'static str) -> Self {
        let controller = Self {
            endpoint,
            state: RwSignal::new(GenerationState::default()),
            session: StoredValue::new(GenerationSession::new()),
            latest: StoredValue::new(None),
        };
        on_cleanup(move || controller.cancel());
        controller
    }

    pub fn is_running(&self) -> bool {
        self.state.with(|state| state.in_progress)
    }

    /// Starts a run with `body` as the JSON request. A `stream_id` is added so
    /// the run can be cancelled on the server too.
    pub fn start(&self, mut body: Value) {
        let stream_id = uuid::Uuid::new_v4().to_string();
        if let Value::Object(fields) = &mut body {
            fields.insert("stream_id".into(), Value::String(stream_id.clone()));
        }

        let endpoint = self.endpoint;
        let request = body.to_string();
        let session = self.session.get_value();
        let superseded = session.is_running();
        let (handle, run) = session.start(async move { open_event_stream(endpoint, request).await });
        let id = handle.id();

        if let Some((previous, previous_stream)) = self.latest.get_value().filter(|_| superseded) {
            debug!("Run {previous} superseded by {id}");
            spawn_local(async move { notify_server_cancel(&previous_stream).await });
        }
        self.latest.set_value(Some((id, stream_id)));
        self.state.set(handle.state());
        info!("Started generation run {id} against {endpoint}");

        let (state, latest) = (self.state, self.latest);
        let is_latest = move || latest.with_value(|l| l.as_ref().is_some_and(|(run, _)| *run == id));
        spawn_local(async move {
            let mut updates = handle.subscribe();
            let forward = async {
                while updates.changed().await.is_ok() {
                    let next = updates.borrow_and_update().clone();
                    if is_latest() {
                        state.set(next);
                    }
                }
            };
            let (finished, ()) = futures::join!(run, forward);
            if is_latest() {
                state.set(finished);
            }
        });
    }

    /// Cancels the active run locally and asks the server to stop producing it.
    pub fn cancel(&self) {
        let Some(session) = self.session.try_get_value() else {
            return;
        };
        if !session.is_running() {
            return;
        }
        session.cancel();
        if let Some((_, stream_id)) = self.latest.get_value() {
            spawn_local(async move { notify_server_cancel(&stream_id).await });
        }
    }
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Idle => "",
        RunPhase::Requesting => "Connecting…",
        RunPhase::Streaming => "Generating…",
        RunPhase::Completed => "Done",
        RunPhase::Cancelled => "Cancelled",
        RunPhase::Failed => "Failed",
    }
}

/// Status line, cancel button, thought log and error toast around a page's
/// own rendering of the generated text.
#[component]
pub fn GenerationPanel(controller: GenerationController, children: ChildrenFn) -> impl IntoView {
    let state = controller.state;
    let status = move || {
        state.with(|s| {
            if s.status.is_empty() {
                phase_label(s.phase).to_string()
            } else {
                s.status.clone()
            }
        })
    };
    let error = Signal::derive(move || state.with(|s| s.error.clone()));
    let (show_thoughts, set_show_thoughts) = signal(true);

    view! {
        <section class="w-full max-w-4xl mx-auto flex flex-col gap-4">
            <div class="flex items-center justify-between">
                <span class="text-sm text-gray-600 dark:text-gray-400">
                    <Show when=move || controller.is_running()>
                        <span class="inline-block w-2 h-2 mr-2 rounded-full bg-sky-500 animate-pulse"></span>
                    </Show>
                    {status}
                </span>
                <Show when=move || controller.is_running()>
                    <button
                        class="px-3 py-1 text-sm rounded bg-gray-200 dark:bg-gray-800 hover:bg-gray-300"
                        on:click=move |_| controller.cancel()
                    >
                        "Stop"
                    </button>
                </Show>
            </div>

            <Show when=move || state.with(|s| !s.thoughts.is_empty())>
                <div class="rounded border border-gray-300 dark:border-gray-700 p-3 text-sm">
                    <button
                        class="font-medium text-gray-700 dark:text-gray-300"
                        on:click=move |_| set_show_thoughts.update(|open| *open = !*open)
                    >
                        {move || format!("Thinking ({})", state.with(|s| s.thoughts.len()))}
                    </button>
                    <Show when=move || show_thoughts.get()>
                        <ul class="mt-2 space-y-1 text-gray-600 dark:text-gray-400">
                            <For
                                each=move || state.with(|s| s.thoughts.clone().into_iter().enumerate().collect::<Vec<_>>())
                                key=|(index, _)| *index
                                children=|(_, thought)| {
                                    view! {
                                        <li>
                                            <span class="text-xs text-gray-400 mr-2">
                                                {thought.timestamp.format("%H:%M:%S").to_string()}
                                            </span>
                                            {thought.content}
                                        </li>
                                    }
                                }
                            />
                        </ul>
                    </Show>
                </div>
            </Show>

            {children()}

            <Toast
                message=error
                on_close=move |_| state.update(|s| s.error = None)
            />
        </section>
    }
}
