use anyhow::Result;
use log::info;

use crate::cancellable_sse::FrameSender;
use crate::services::gemini::GeminiClient;
use crate::services::github::GithubClient;
use crate::services::prompts;
use crate::types::ReadmeRequest;

const CRITIQUE_THOUGHTS: usize = 3;

/// Draft, critique, refine. The refined README replaces the draft on the
/// client through a `reset` frame.
pub async fn generate_readme(
    gemini: GeminiClient,
    github: GithubClient,
    request: ReadmeRequest,
    tx: FrameSender,
) -> Result<()> {
    let username = request.username.clone();
    info!("Starting README generation for {username}");

    tx.status(format!("Fetching GitHub profile for @{username}")).await?;
    let summary = github.fetch_profile_summary(&username).await?;
    tx.thought(format!(
        "Found {} original repositories with {} stars{}.",
        summary.original_repos,
        summary.total_stars,
        summary
            .top_language()
            .map(|l| format!(", mostly written in {l}"))
            .unwrap_or_default()
    ))
    .await?;

    tx.status("Drafting README").await?;
    let draft = gemini
        .stream_generate(&prompts::readme_draft(&summary, &request), &tx)
        .await?;

    if request.refine {
        tx.status("Reviewing the draft").await?;
        let critique = gemini.generate(&prompts::readme_critique(&draft)).await?;
        for point in critique_highlights(&critique, CRITIQUE_THOUGHTS) {
            tx.thought(point).await?;
        }

        tx.status("Refining README").await?;
        tx.reset().await?;
        gemini
            .stream_generate(&prompts::readme_refine(&draft, &critique), &tx)
            .await?;
    }

    tx.status("README ready").await?;
    info!("README generation for {username} finished");
    Ok(())
}

/// First `limit` non-empty review lines, bullet markers stripped.
pub fn critique_highlights(critique: &str, limit: usize) -> Vec<String> {
    critique
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(|line| format!("Review: {line}"))
        .collect()
}
