use leptos::prelude::*;
use serde_json::json;

use crate::components::generation_panel::{GenerationController, GenerationPanel};
use crate::parsing::strip_code_fence;
use crate::widgets::WidgetConfig;

/// The HTML document inside the model output. Prose or fences around the
/// doctype ... `</html>` span are dropped.
pub fn portfolio_document(text: &str) -> &str {
    let body = strip_code_fence(text);
    let lower = body.to_ascii_lowercase();
    let start = lower
        .find("<!doctype")
        .or_else(|| lower.find("<html"))
        .unwrap_or(0);
    let end = lower
        .rfind("</html>")
        .map_or(body.len(), |i| i + "</html>".len());
    if start < end {
        &body[start..end]
    } else {
        &body[start..]
    }
}

#[component]
pub fn PortfolioPage() -> impl IntoView {
    let controller = GenerationController::new("/api/stream/portfolio");
    let (username, set_username) = signal(String::new());
    let (theme, set_theme) = signal(String::from("default"));
    let themes: Vec<String> = WidgetConfig::default()
        .themes
        .into_iter()
        .map(|t| t.name)
        .collect();

    let generate = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let username = username.get_untracked().trim().to_string();
        if username.is_empty() {
            return;
        }
        controller.start(json!({ "username": username, "theme": theme.get_untracked() }));
    };

    let document = move || controller.state.with(|s| portfolio_document(&s.text).to_string());

    view! {
        <form class="w-full max-w-4xl mx-auto flex items-center gap-3 p-4" on:submit=generate>
            <input
                type="text"
                placeholder="GitHub username"
                class="flex-1 px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                prop:value=username
                on:input=move |ev| set_username.set(event_target_value(&ev))
            />
            <select
                class="px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                on:change=move |ev| set_theme.set(event_target_value(&ev))
            >
                {themes
                    .into_iter()
                    .map(|name| {
                        let option_value = name.clone();
                        let current = name.clone();
                        view! {
                            <option value=option_value selected=move || theme.get() == current>
                                {name}
                            </option>
                        }
                    })
                    .collect_view()}
            </select>
            <button
                type="submit"
                class="px-4 py-2 rounded bg-emerald-600 hover:bg-emerald-700 text-white font-semibold"
            >
                "Build site"
            </button>
        </form>

        <GenerationPanel controller=controller>
            <Show when=move || !controller.is_running() && !document().is_empty()>
                // empty sandbox: the generated page gets no scripts and no same-origin access
                <iframe
                    title="Portfolio preview"
                    sandbox=""
                    srcdoc=document
                    class="w-full h-[720px] rounded border border-gray-200 dark:border-gray-800 bg-white"
                ></iframe>
            </Show>
            <Show when=move || controller.is_running()>
                <p class="text-sm text-gray-500">
                    {move || format!("Writing HTML… {} characters so far", controller.state.with(|s| s.text.len()))}
                </p>
            </Show>
        </GenerationPanel>
    }
}
