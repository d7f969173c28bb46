use leptos::prelude::*;
use leptos_meta::{provide_meta_context, MetaTags, Title};
use leptos_router::{
    components::{Route, Router, Routes, A},
    path, StaticSegment,
};

use crate::pages::portfolio::PortfolioPage;
use crate::pages::readme::ReadmePage;
use crate::pages::visualizer::VisualizerPage;
use crate::pages::wrapped::WrappedPage;

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <AutoReload options=options.clone() />
                <HydrationScripts options />
                <MetaTags />
            </head>
            <body class="bg-white dark:bg-gray-950 text-gray-900 dark:text-gray-100">
                <App />
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();

    view! {
        <Title text="GitSkins" />
        <Router>
            <NavBar />
            <main class="pb-16">
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=StaticSegment("") view=ReadmePage />
                    <Route path=path!("wrapped") view=WrappedPage />
                    <Route path=path!("visualize") view=VisualizerPage />
                    <Route path=path!("portfolio") view=PortfolioPage />
                </Routes>
            </main>
        </Router>
    }
}

#[component]
fn NavBar() -> impl IntoView {
    let link = "px-3 py-2 rounded hover:bg-gray-100 dark:hover:bg-gray-800";

    view! {
        <nav class="w-full flex items-center justify-between px-4 py-3 border-b border-gray-200 dark:border-gray-800">
            <a href="/" class="text-2xl font-bold text-sky-600 dark:text-sky-400">
                "GitSkins"
            </a>
            <div class="flex gap-2 text-sm">
                <A href="/" attr:class=link>"README"</A>
                <A href="/wrapped" attr:class=link>"Wrapped"</A>
                <A href="/visualize" attr:class=link>"Visualize"</A>
                <A href="/portfolio" attr:class=link>"Portfolio"</A>
            </div>
        </nav>
    }
}
