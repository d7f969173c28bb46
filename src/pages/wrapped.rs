use leptos::prelude::*;
use serde_json::json;

use crate::components::generation_panel::{GenerationController, GenerationPanel};
use crate::generation::{GenerationState, RunPhase};
use crate::models::{WrappedProfile, WrappedStory};
use crate::parsing::parse_or_default;

fn profile_of(state: &GenerationState) -> Option<WrappedProfile> {
    state
        .profile
        .clone()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// The finished story, once the run has completed. Output the model got
/// wrong still yields the labelled fallback story.
pub fn story_of(state: &GenerationState) -> Option<WrappedStory> {
    if state.phase != RunPhase::Completed {
        return None;
    }
    let profile = profile_of(state);
    Some(parse_or_default(&state.text, || {
        WrappedStory::fallback(profile.as_ref())
    }))
}

#[component]
fn ProfileHeader(profile: WrappedProfile) -> impl IntoView {
    view! {
        <div class="flex items-center gap-4">
            <img src=profile.avatar_url.clone() alt=profile.login.clone() class="w-16 h-16 rounded-full" />
            <div>
                <h2 class="text-xl font-bold">{format!("{} in {}", profile.name, profile.year)}</h2>
                <p class="text-sm text-gray-600 dark:text-gray-400">
                    {format!(
                        "{} stars · {} followers · {} original repositories",
                        profile.total_stars,
                        profile.followers,
                        profile.original_repos,
                    )}
                </p>
            </div>
        </div>
    }
}

#[component]
fn StoryView(story: WrappedStory) -> impl IntoView {
    let is_fallback = story.is_fallback;
    view! {
        <article class="flex flex-col gap-4">
            <h2 class="text-2xl font-bold text-center">{story.title}</h2>
            <Show when=move || is_fallback>
                <p class="text-center text-sm text-amber-600">
                    "The full story couldn't be generated, so here is a short summary."
                </p>
            </Show>
            {story
                .slides
                .into_iter()
                .map(|slide| {
                    view! {
                        <div class="rounded-lg p-6 bg-gradient-to-br from-sky-600 to-indigo-700 text-white">
                            <h3 class="text-lg font-semibold">{slide.heading}</h3>
                            {slide
                                .highlight
                                .map(|highlight| view! { <p class="text-4xl font-black my-2">{highlight}</p> })}
                            <p>{slide.body}</p>
                        </div>
                    }
                })
                .collect_view()}
            <p class="text-center italic">{story.closing}</p>
        </article>
    }
}

#[component]
pub fn WrappedPage() -> impl IntoView {
    let controller = GenerationController::new("/api/stream/wrapped");
    let (username, set_username) = signal(String::new());
    let (year, set_year) = signal(String::new());

    let generate = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let username = username.get_untracked().trim().to_string();
        if username.is_empty() {
            return;
        }
        let year = year.get_untracked().trim().parse::<i32>().ok();
        controller.start(json!({ "username": username, "year": year }));
    };

    let state = controller.state;
    let profile = Memo::new(move |_| state.with(profile_of));
    let story = Memo::new(move |_| state.with(story_of));

    view! {
        <form class="w-full max-w-4xl mx-auto flex items-center gap-3 p-4" on:submit=generate>
            <input
                type="text"
                placeholder="GitHub username"
                class="flex-1 px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                prop:value=username
                on:input=move |ev| set_username.set(event_target_value(&ev))
            />
            <input
                type="number"
                placeholder="Year"
                class="w-28 px-3 py-2 rounded border border-gray-300 dark:border-gray-700 dark:bg-gray-900"
                prop:value=year
                on:input=move |ev| set_year.set(event_target_value(&ev))
            />
            <button
                type="submit"
                class="px-4 py-2 rounded bg-indigo-600 hover:bg-indigo-700 text-white font-semibold"
            >
                "Wrap it"
            </button>
        </form>

        <GenerationPanel controller=controller>
            {move || profile.get().map(|profile| view! { <ProfileHeader profile /> })}
            {move || match story.get() {
                Some(story) => view! { <StoryView story /> }.into_any(),
                None if controller.is_running() => {
                    view! {
                        <p class="text-sm text-gray-500">
                            {move || format!("Writing your story… {} characters so far", state.with(|s| s.text.len()))}
                        </p>
                    }
                        .into_any()
                }
                None => ().into_any(),
            }}
        </GenerationPanel>
    }
}
