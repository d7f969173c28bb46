use anyhow::Result;
use chrono::{Datelike, Utc};
use log::info;

use crate::cancellable_sse::FrameSender;
use crate::models::WrappedProfile;
use crate::services::gemini::GeminiClient;
use crate::services::github::GithubClient;
use crate::services::prompts;
use crate::types::WrappedRequest;

/// Sends the structured profile once, then streams the narrative as a JSON
/// document in `text` frames. The client parses it when the stream ends.
pub async fn generate_wrapped(
    gemini: GeminiClient,
    github: GithubClient,
    request: WrappedRequest,
    tx: FrameSender,
) -> Result<()> {
    let year = request.year.unwrap_or_else(|| Utc::now().year());
    info!("Starting Wrapped {year} for {}", request.username);

    tx.status(format!("Collecting @{}'s {year}", request.username)).await?;
    let summary = github.fetch_profile_summary(&request.username).await?;

    let profile = WrappedProfile::from_summary(&summary, year);
    tx.profile(&profile).await?;

    tx.status("Writing your story").await?;
    gemini
        .stream_generate(&prompts::wrapped_story(&summary, &profile), &tx)
        .await?;

    tx.status("Story ready").await?;
    Ok(())
}
