use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Repositories kept in a summary's highlight list.
pub const TOP_REPO_COUNT: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GithubUser {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: String,
    pub html_url: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl GithubUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.login)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GithubRepo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub fork: bool,
    pub html_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguageShare {
    pub name: String,
    pub repos: u32,
    pub percent: f64,
}

/// Aggregated view of a user used by widgets and prompts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProfileSummary {
    pub user: GithubUser,
    pub top_repos: Vec<GithubRepo>,
    pub languages: Vec<LanguageShare>,
    pub total_stars: u32,
    pub total_forks: u32,
    pub original_repos: u32,
    /// Last push of every original repository, not only the top ones.
    #[serde(default)]
    pub push_dates: Vec<DateTime<Utc>>,
}

impl ProfileSummary {
    /// Forks are excluded from every aggregate.
    pub fn build(user: GithubUser, repos: Vec<GithubRepo>) -> Self {
        let mut originals: Vec<GithubRepo> = repos.into_iter().filter(|r| !r.fork).collect();

        let total_stars = originals.iter().map(|r| r.stargazers_count).sum();
        let total_forks = originals.iter().map(|r| r.forks_count).sum();
        let original_repos = originals.len() as u32;
        let push_dates = originals.iter().filter_map(|r| r.pushed_at).collect();

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for language in originals.iter().filter_map(|r| r.language.as_deref()) {
            *counts.entry(language).or_default() += 1;
        }
        let counted: u32 = counts.values().sum();
        let mut languages: Vec<LanguageShare> = counts
            .into_iter()
            .map(|(name, repos)| LanguageShare {
                name: name.to_string(),
                repos,
                percent: f64::from(repos) * 100.0 / f64::from(counted),
            })
            .collect();
        languages.sort_by(|a, b| b.repos.cmp(&a.repos).then_with(|| a.name.cmp(&b.name)));

        originals.sort_by(|a, b| {
            b.stargazers_count
                .cmp(&a.stargazers_count)
                .then_with(|| b.pushed_at.cmp(&a.pushed_at))
        });
        originals.truncate(TOP_REPO_COUNT);

        Self {
            user,
            top_repos: originals,
            languages,
            total_stars,
            total_forks,
            original_repos,
            push_dates,
        }
    }

    pub fn repos_pushed_in(&self, year: i32) -> u32 {
        self.push_dates.iter().filter(|d| d.year() == year).count() as u32
    }

    pub fn top_language(&self) -> Option<&str> {
        self.languages.first().map(|l| l.name.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn forks_are_excluded() {
        let summary = summary();
        assert_eq!(summary.original_repos, 4);
        assert_eq!(summary.total_stars, 60);
        assert!(summary.top_repos.iter().all(|r| r.name != "forked"));
        assert!(summary.languages.iter().all(|l| l.name != "Go"));
    }

    #[test]
    fn languages_sorted_by_repo_count() {
        let summary = summary();
        let names: Vec<_> = summary.languages.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Rust", "TypeScript"]);
        let total: f64 = summary.languages.iter().map(|l| l.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(summary.top_language(), Some("Rust"));
    }

    #[test]
    fn top_repos_ordered_by_stars() {
        let summary = summary();
        assert_eq!(summary.top_repos[0].name, "hello-world");
        assert_eq!(summary.top_repos[1].name, "spoon-knife");
    }

    #[test]
    fn empty_profile() {
        let summary = ProfileSummary::build(user("ghost"), Vec::new());
        assert!(summary.languages.is_empty());
        assert!(summary.top_repos.is_empty());
        assert_eq!(summary.top_language(), None);
    }

    #[test]
    fn pushes_are_counted_across_all_original_repos() {
        let pushed: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();
        let older: DateTime<Utc> = "2023-06-01T12:00:00Z".parse().unwrap();
        let mut repos: Vec<GithubRepo> = (0..9)
            .map(|i| {
                let mut r = repo(&format!("repo-{i}"), Some("Rust"), i, false);
                r.pushed_at = Some(pushed);
                r
            })
            .collect();
        let mut fork = repo("fork", None, 0, true);
        fork.pushed_at = Some(pushed);
        repos.push(fork);
        let mut stale = repo("stale", None, 0, false);
        stale.pushed_at = Some(older);
        repos.push(stale);

        let summary = ProfileSummary::build(user("octocat"), repos);
        assert_eq!(summary.top_repos.len(), TOP_REPO_COUNT);
        assert_eq!(summary.repos_pushed_in(2025), 9);
        assert_eq!(summary.repos_pushed_in(2023), 1);
    }

    #[test]
    fn display_name_falls_back_to_login() {
        let mut u = user("octocat");
        u.name = Some("  ".into());
        assert_eq!(u.display_name(), "octocat");
    }
}
