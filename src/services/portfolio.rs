use anyhow::Result;
use log::info;

use crate::cancellable_sse::FrameSender;
use crate::services::gemini::GeminiClient;
use crate::services::github::GithubClient;
use crate::services::prompts;
use crate::types::PortfolioRequest;
use crate::widgets::Theme;

/// Streams a self-contained HTML portfolio page as `text` frames.
pub async fn generate_portfolio(
    gemini: GeminiClient,
    github: GithubClient,
    request: PortfolioRequest,
    theme: Theme,
    tx: FrameSender,
) -> Result<()> {
    info!("Starting portfolio for {} in theme {}", request.username, theme.name);

    tx.status("Fetching GitHub profile").await?;
    let summary = github.fetch_profile_summary(&request.username).await?;
    tx.thought(format!(
        "{} original repositories to feature, mostly {}.",
        summary.original_repos,
        summary.top_language().unwrap_or("unlabelled code")
    ))
    .await?;

    tx.status(format!("Building a {} portfolio", theme.name)).await?;
    gemini
        .stream_generate(&prompts::portfolio_site(&summary, &theme), &tx)
        .await?;

    tx.status("Portfolio ready").await?;
    Ok(())
}
