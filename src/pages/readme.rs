use leptos::prelude::*;
use serde_json::json;

use crate::components::generation_panel::{GenerationController, GenerationPanel};
use crate::components::markdown::MarkdownPreview;
use crate::types::ReadmeStyle;

#[component]
pub fn ReadmePage() -> impl IntoView {
    let controller = GenerationController::new("/api/stream/readme");
    let (username, set_username) = signal(String::new());
    let (style, set_style) = signal(ReadmeStyle::default());
    let (include_stats, set_include_stats) = signal(true);
    let (include_languages, set_include_languages) = signal(true);
    let (refine, set_refine) = signal(true);
    let (show_source, set_show_source) = signal(false);

    let generate = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let username = username.get_untracked().trim().to_string();
        if username.is_empty() {
            return;
        }
        controller.start(json!({
            "username": username,
            "style": style.get_untracked(),
            "include_stats": include_stats.get_untracked(),
            "include_languages": include_languages.get_untracked(),
            "refine": refine.get_untracked(),
        }));
    };

    let text = Signal::derive(move || controller.state.with(|s| s.text.clone()));

    view! {
        <form class="w-full max-w-4xl mx-auto flex flex-wrap items-center gap-3 p-4" on:submit=generate>
            <input
                type="text"
                placeholder="GitHub username"
                class="flex-1 min-w-48 px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                prop:value=username
                on:input=move |ev| set_username.set(event_target_value(&ev))
            />
            <select
                class="px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                on:change=move |ev| {
                    let chosen = match event_target_value(&ev).as_str() {
                        "minimal" => ReadmeStyle::Minimal,
                        "creative" => ReadmeStyle::Creative,
                        _ => ReadmeStyle::Professional,
                    };
                    set_style.set(chosen);
                }
            >
                {[ReadmeStyle::Professional, ReadmeStyle::Minimal, ReadmeStyle::Creative]
                    .into_iter()
                    .map(|option| {
                        view! {
                            <option value=option.label() selected=move || style.get() == option>
                                {option.label()}
                            </option>
                        }
                    })
                    .collect_view()}
            </select>
            <label class="text-sm">
                <input type="checkbox" prop:checked=include_stats on:change=move |ev| set_include_stats.set(event_target_checked(&ev)) />
                " Stats"
            </label>
            <label class="text-sm">
                <input type="checkbox" prop:checked=include_languages on:change=move |ev| set_include_languages.set(event_target_checked(&ev)) />
                " Languages"
            </label>
            <label class="text-sm">
                <input type="checkbox" prop:checked=refine on:change=move |ev| set_refine.set(event_target_checked(&ev)) />
                " Self-review"
            </label>
            <button
                type="submit"
                class="px-4 py-2 rounded bg-sky-600 hover:bg-sky-700 text-white font-semibold"
            >
                "Generate"
            </button>
        </form>

        <GenerationPanel controller=controller>
            <Show when=move || !text.with(String::is_empty)>
                <div class="flex justify-end">
                    <button
                        class="text-sm text-sky-600 dark:text-sky-400"
                        on:click=move |_| set_show_source.update(|s| *s = !*s)
                    >
                        {move || if show_source.get() { "Preview" } else { "Markdown" }}
                    </button>
                </div>
                <Show
                    when=move || show_source.get()
                    fallback=move || view! { <MarkdownPreview content=text class="p-4 rounded border border-gray-200 dark:border-gray-800" /> }
                >
                    <textarea
                        readonly
                        class="w-full h-96 font-mono text-sm p-3 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                        prop:value=text
                    ></textarea>
                </Show>
            </Show>
        </GenerationPanel>
    }
}
