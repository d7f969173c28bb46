use serde::{Deserialize, Serialize};

use super::profile::ProfileSummary;

/// Structured payload sent once, as the `profile` frame, at the start of a
/// Wrapped stream.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WrappedProfile {
    pub login: String,
    pub name: String,
    pub avatar_url: String,
    pub year: i32,
    pub total_stars: u32,
    pub followers: u32,
    pub original_repos: u32,
    pub repos_pushed_this_year: u32,
    pub top_language: Option<String>,
}

impl WrappedProfile {
    pub fn from_summary(summary: &ProfileSummary, year: i32) -> Self {
        Self {
            login: summary.user.login.clone(),
            name: summary.user.display_name().to_string(),
            avatar_url: summary.user.avatar_url.clone(),
            year,
            total_stars: summary.total_stars,
            followers: summary.user.followers,
            original_repos: summary.original_repos,
            repos_pushed_this_year: summary.repos_pushed_in(year),
            top_language: summary.top_language().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WrappedSlide {
    pub heading: String,
    pub body: String,
    #[serde(default)]
    pub highlight: Option<String>,
}

/// The narrative the model streams back as one JSON document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WrappedStory {
    pub title: String,
    pub slides: Vec<WrappedSlide>,
    #[serde(default)]
    pub closing: String,
    #[serde(default)]
    pub is_fallback: bool,
}

impl WrappedStory {
    /// Deterministic stand-in used when the model output cannot be parsed.
    pub fn fallback(profile: Option<&WrappedProfile>) -> Self {
        let mut slides = Vec::new();
        if let Some(p) = profile {
            slides.push(WrappedSlide {
                heading: format!("{}'s {}", p.name, p.year),
                body: format!(
                    "{} original repositories and {} stars so far.",
                    p.original_repos, p.total_stars
                ),
                highlight: Some(format!("{} stars", p.total_stars)),
            });
            if let Some(language) = &p.top_language {
                slides.push(WrappedSlide {
                    heading: "Favourite language".to_string(),
                    body: format!("Most of your projects are written in {language}."),
                    highlight: Some(language.clone()),
                });
            }
        }

        Self {
            title: "Your Year in Code (summary unavailable)".to_string(),
            slides,
            closing: "We couldn't generate the full story this time.".to_string(),
            is_fallback: true,
        }
    }
}
