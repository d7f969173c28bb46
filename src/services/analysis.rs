use log::{info, warn};

use crate::error::AppError;
use crate::models::{ProfileAnalysis, ThemeRecommendation};
use crate::parsing::parse_or_default;
use crate::services::gemini::GeminiClient;
use crate::services::github::GithubClient;
use crate::services::prompts;
use crate::widgets::WidgetConfig;

pub async fn analyze_profile(
    gemini: &GeminiClient,
    github: &GithubClient,
    username: &str,
) -> Result<ProfileAnalysis, AppError> {
    info!("Analysing profile {username}");
    let summary = github.fetch_profile_summary(username).await?;
    let raw = gemini.generate(&prompts::profile_analysis(&summary)).await?;
    Ok(parse_or_default(&raw, || ProfileAnalysis::fallback(username)))
}

/// Asks the model for one of the configured widget themes.
pub async fn recommend_theme(
    gemini: &GeminiClient,
    github: &GithubClient,
    widgets: &WidgetConfig,
    username: &str,
) -> Result<ThemeRecommendation, AppError> {
    info!("Recommending a theme for {username}");
    let summary = github.fetch_profile_summary(username).await?;
    let names: Vec<&str> = widgets.themes.iter().map(|t| t.name.as_str()).collect();
    let raw = gemini
        .generate(&prompts::theme_recommendation(&summary, &names))
        .await?;
    Ok(accept_recommendation(&raw, widgets))
}

/// Parses the model's pick. A theme the table does not carry falls back to
/// the default theme.
pub fn accept_recommendation(raw: &str, widgets: &WidgetConfig) -> ThemeRecommendation {
    let fallback = || ThemeRecommendation::fallback(&widgets.default_theme);
    let mut pick = parse_or_default(raw, fallback);
    match widgets
        .themes
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(pick.theme.trim()))
    {
        Some(theme) => {
            pick.theme = theme.name.clone();
            pick
        }
        None => {
            warn!("Model recommended unknown theme '{}'", pick.theme);
            fallback()
        }
    }
}
