use leptos::prelude::*;
use serde_json::json;

use crate::components::generation_panel::{GenerationController, GenerationPanel};
use crate::parsing::strip_code_fence;

/// The Mermaid source inside the model output, without any code fence.
pub fn mermaid_source(text: &str) -> &str {
    strip_code_fence(text)
}

#[component]
pub fn VisualizerPage() -> impl IntoView {
    let controller = GenerationController::new("/api/stream/visualize");
    let (repository, set_repository) = signal(String::new());
    let (invalid, set_invalid) = signal(false);

    let generate = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let input = repository.get_untracked();
        match input.trim().split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
                set_invalid.set(false);
                controller.start(json!({ "owner": owner, "repo": repo }));
            }
            _ => set_invalid.set(true),
        }
    };

    let diagram = move || controller.state.with(|s| mermaid_source(&s.text).to_string());

    view! {
        <form class="w-full max-w-4xl mx-auto flex items-center gap-3 p-4" on:submit=generate>
            <input
                type="text"
                placeholder="owner/repository"
                class="flex-1 px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                prop:value=repository
                on:input=move |ev| set_repository.set(event_target_value(&ev))
            />
            <button
                type="submit"
                class="px-4 py-2 rounded bg-sky-600 hover:bg-sky-700 text-white font-semibold"
            >
                "Visualize"
            </button>
        </form>
        <Show when=move || invalid.get()>
            <p class="text-center text-sm text-red-600">"Enter a repository as owner/name."</p>
        </Show>

        <GenerationPanel controller=controller>
            <Show when=move || !diagram().is_empty()>
                <pre class="mermaid p-4 rounded border border-gray-200 dark:border-gray-800 overflow-x-auto text-sm">
                    {diagram}
                </pre>
            </Show>
        </GenerationPanel>
    }
}
