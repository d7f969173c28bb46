use std::fmt::Write;

use crate::models::{ProfileSummary, WrappedProfile};
use crate::widgets::Theme;
use crate::services::gemini::GeminiPrompt;
use crate::types::{ReadmeRequest, ReadmeStyle};

/// Plain-text fact sheet about a profile, shared by every prompt.
pub fn profile_facts(summary: &ProfileSummary) -> String {
    let user = &summary.user;
    let mut facts = String::new();
    let _ = writeln!(facts, "Name: {}", user.display_name());
    let _ = writeln!(facts, "Username: {}", user.login);
    if let Some(bio) = user.bio.as_deref().filter(|b| !b.is_empty()) {
        let _ = writeln!(facts, "Bio: {bio}");
    }
    if let Some(location) = user.location.as_deref().filter(|l| !l.is_empty()) {
        let _ = writeln!(facts, "Location: {location}");
    }
    if let Some(company) = user.company.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(facts, "Company: {company}");
    }
    let _ = writeln!(
        facts,
        "Followers: {}, original repositories: {}, total stars: {}, total forks: {}",
        user.followers, summary.original_repos, summary.total_stars, summary.total_forks
    );

    if !summary.languages.is_empty() {
        let languages: Vec<String> = summary
            .languages
            .iter()
            .map(|l| format!("{} ({:.0}%)", l.name, l.percent))
            .collect();
        let _ = writeln!(facts, "Languages: {}", languages.join(", "));
    }

    if !summary.top_repos.is_empty() {
        let _ = writeln!(facts, "Top repositories:");
        for repo in &summary.top_repos {
            let _ = writeln!(
                facts,
                "- {} ({} stars, {}): {}",
                repo.name,
                repo.stargazers_count,
                repo.language.as_deref().unwrap_or("n/a"),
                repo.description.as_deref().unwrap_or("no description")
            );
        }
    }
    facts
}

pub fn readme_draft(summary: &ProfileSummary, request: &ReadmeRequest) -> GeminiPrompt {
    let mut sections = vec!["a short introduction", "featured projects with links"];
    if request.include_stats {
        sections.push("a stats line using the GitSkins card widget");
    }
    if request.include_languages {
        sections.push("a languages and tools section");
    }
    let tone = match request.style {
        ReadmeStyle::Minimal => "Keep it short and understated.",
        ReadmeStyle::Professional => "Keep the tone polished and professional.",
        ReadmeStyle::Creative => "Be playful, use emoji sparingly and a memorable tagline.",
    };

    GeminiPrompt::new(
        "You write GitHub profile README files in Markdown. Output only the Markdown document.",
        format!(
            "Write a {} profile README.\n{tone}\nInclude: {}.\nStats card URL: /api/widgets/card/{}\n\nProfile:\n{}",
            request.style.label(),
            sections.join(", "),
            summary.user.login,
            profile_facts(summary)
        ),
    )
    .with_thoughts()
    .temperature(0.8)
}

pub fn readme_critique(draft: &str) -> GeminiPrompt {
    GeminiPrompt::new(
        "You review GitHub profile READMEs. Reply with at most five short bullet points, most important first.",
        format!("Critique this README for clarity, structure and accuracy:\n\n{draft}"),
    )
    .temperature(0.3)
}

pub fn readme_refine(draft: &str, critique: &str) -> GeminiPrompt {
    GeminiPrompt::new(
        "You write GitHub profile README files in Markdown. Output only the Markdown document.",
        format!("Rewrite the README below, addressing every point of the review.\n\nReview:\n{critique}\n\nREADME:\n{draft}"),
    )
    .temperature(0.6)
}

pub fn wrapped_story(summary: &ProfileSummary, profile: &WrappedProfile) -> GeminiPrompt {
    GeminiPrompt::new(
        "You turn developer statistics into a short, upbeat year-in-review story.",
        format!(
            "Create a {} GitHub Wrapped story for {}.\nRespond with JSON: {{\"title\": string, \"slides\": [{{\"heading\": string, \"body\": string, \"highlight\": string}}], \"closing\": string}} with 4 to 6 slides.\n\nProfile:\n{}",
            profile.year,
            profile.name,
            profile_facts(summary)
        ),
    )
    .json()
    .temperature(0.9)
}

pub fn profile_analysis(summary: &ProfileSummary) -> GeminiPrompt {
    GeminiPrompt::new(
        "You describe developer personalities from their public GitHub activity.",
        format!(
            "Analyse this developer.\nRespond with JSON: {{\"archetype\": string, \"summary\": string, \"strengths\": [string], \"focus_areas\": [string]}}.\n\nProfile:\n{}",
            profile_facts(summary)
        ),
    )
    .json()
    .temperature(0.5)
}

pub fn theme_recommendation(summary: &ProfileSummary, themes: &[&str]) -> GeminiPrompt {
    GeminiPrompt::new(
        "You pick colour themes for developer profile widgets.",
        format!(
            "Choose the theme that best fits this developer from: {}.\nRespond with JSON: {{\"theme\": string, \"reason\": string}}.\n\nProfile:\n{}",
            themes.join(", "),
            profile_facts(summary)
        ),
    )
    .json()
    .temperature(0.4)
}

pub fn portfolio_site(summary: &ProfileSummary, theme: &Theme) -> GeminiPrompt {
    GeminiPrompt::new(
        "You build single-page developer portfolio websites. Output only one complete HTML document with inline CSS and no JavaScript.",
        format!(
            "Build a portfolio site for {}.\nSections: hero with name and bio, featured projects linking to GitHub, languages, contact links.\nPalette: background {}, text {}, headings {}, accent {}.\n\nProfile:\n{}",
            summary.user.display_name(),
            theme.background,
            theme.text,
            theme.title,
            theme.accent,
            profile_facts(summary)
        ),
    )
    .with_thoughts()
    .temperature(0.7)
}

pub fn repo_diagram(full_name: &str, description: Option<&str>, outline: &str) -> GeminiPrompt {
    GeminiPrompt::new(
        "You draw software architecture diagrams as Mermaid flowcharts. Output only the Mermaid source, starting with 'flowchart'.",
        format!(
            "Repository: {full_name}\nDescription: {}\n\nLayout:\n{outline}\n\nDraw the main components and how they depend on each other.",
            description.unwrap_or("none")
        ),
    )
    .with_thoughts()
    .temperature(0.4)
}
