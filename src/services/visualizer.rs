use std::collections::BTreeMap;

use anyhow::Result;
use log::info;

use crate::cancellable_sse::FrameSender;
use crate::services::gemini::GeminiClient;
use crate::services::github::GithubClient;
use crate::services::prompts;
use crate::types::VisualizeRequest;

const OUTLINE_DIRECTORIES: usize = 40;

pub async fn generate_diagram(
    gemini: GeminiClient,
    github: GithubClient,
    request: VisualizeRequest,
    tx: FrameSender,
) -> Result<()> {
    let VisualizeRequest { owner, repo, .. } = request;
    info!("Starting diagram for {owner}/{repo}");

    tx.status(format!("Reading {owner}/{repo}")).await?;
    let details = github.fetch_repo(&owner, &repo).await?;
    let paths = github
        .fetch_tree(&owner, &repo, &details.default_branch)
        .await?;

    let outline = outline_tree(&paths, OUTLINE_DIRECTORIES);
    tx.thought(format!(
        "{} files, grouped into {} outline entries.",
        paths.len(),
        outline.lines().count()
    ))
    .await?;

    tx.status("Drawing diagram").await?;
    gemini
        .stream_generate(
            &prompts::repo_diagram(&details.full_name, details.description.as_deref(), &outline),
            &tx,
        )
        .await?;

    tx.status("Diagram ready").await?;
    Ok(())
}

/// One line per top-level entry and its direct subdirectories, with file
/// counts. At most `limit` lines.
pub fn outline_tree(paths: &[String], limit: usize) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        let mut parts = path.split('/');
        let Some(top) = parts.next() else { continue };
        let key = match (parts.next(), parts.next()) {
            (Some(sub), Some(_)) => format!("{top}/{sub}/"),
            (Some(_), None) => format!("{top}/"),
            (None, _) => top.to_string(),
        };
        *counts.entry(key).or_default() += 1;
    }

    counts
        .into_iter()
        .take(limit)
        .map(|(entry, files)| {
            if entry.ends_with('/') {
                format!("{entry} ({files} files)")
            } else {
                entry
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_groups_by_directory() {
        let paths: Vec<String> = [
            "Cargo.toml",
            "src/lib.rs",
            "src/main.rs",
            "src/services/github.rs",
            "src/services/gemini.rs",
            "README.md",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();

        assert_eq!(
            outline_tree(&paths, 10),
            "Cargo.toml\nREADME.md\nsrc/ (2 files)\nsrc/services/ (2 files)"
        );
    }

    #[test]
    fn outline_respects_limit() {
        let paths: Vec<String> = (0..10).map(|i| format!("dir{i}/file.rs")).collect();
        assert_eq!(outline_tree(&paths, 3).lines().count(), 3);
    }
}
