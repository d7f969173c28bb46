use leptos::prelude::*;

/// Bottom-right notice, hidden while `message` is `None`.
#[component]
pub fn Toast(
    #[prop(into)] message: Signal<Option<String>>,
    #[prop(into)] on_close: Callback<()>,
) -> impl IntoView {
    let opacity_class = move || {
        if message.with(Option::is_some) {
            "opacity-100"
        } else {
            "opacity-0 pointer-events-none"
        }
    };

    view! {
        <div
            role="alert"
            class=move || {
                format!(
                    "{} fixed bottom-4 right-4 bg-gray-100 dark:bg-gray-900 text-red-600 dark:text-red-400 px-4 py-2 rounded shadow-lg transition-opacity duration-300",
                    opacity_class(),
                )
            }
        >
            {move || message.get().unwrap_or_default()}
            <button
                class="ml-2 text-gray-500 hover:text-gray-800 dark:hover:text-gray-200"
                on:click=move |_| on_close.run(())
            >
                "×"
            </button>
        </div>
    }
}
