use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use chrono::NaiveDate;
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;

use crate::models::{ContributionDay, GithubRepo, GithubUser, ProfileSummary};

const USER_AGENT: &str = "gitskins";

const CONTRIBUTIONS_QUERY: &str = "query($login: String!) {
  user(login: $login) {
    contributionsCollection {
      contributionCalendar {
        weeks { contributionDays { date contributionCount } }
      }
    }
  }
}";

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})$").expect("valid username regex"));
static REPO_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("valid repo regex"));

pub fn is_valid_username(username: &str) -> bool {
    USERNAME.is_match(username)
}

pub fn is_valid_repo_name(repo: &str) -> bool {
    REPO_NAME.is_match(repo) && repo != "." && repo != ".."
}

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub user or repository '{0}' was not found")]
    NotFound(String),
    #[error("GitHub API rate limit exceeded, try again later")]
    RateLimited,
    #[error("GitHub API returned status {0}")]
    Status(u16),
    #[error("Contribution data needs a GitHub token")]
    TokenRequired,
    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid GitHub URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoDetails {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub default_branch: String,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarData {
    user: Option<CalendarUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarUser {
    contributions_collection: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    weeks: Vec<ContributionWeek>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionWeek {
    contribution_days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarDay {
    date: NaiveDate,
    contribution_count: u32,
}

fn contribution_days(
    response: GraphQlResponse<CalendarData>,
    username: &str,
) -> Result<Vec<ContributionDay>, GithubError> {
    if let Some(user) = response.data.and_then(|data| data.user) {
        return Ok(user
            .contributions_collection
            .contribution_calendar
            .weeks
            .into_iter()
            .flat_map(|week| week.contribution_days)
            .map(|day| ContributionDay {
                date: day.date,
                count: day.contribution_count,
            })
            .collect());
    }
    match response.errors.into_iter().next() {
        Some(error) if error.kind.as_deref() != Some("NOT_FOUND") => {
            Err(GithubError::GraphQl(error.message))
        }
        _ => Err(GithubError::NotFound(username.to_string())),
    }
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: url::Url,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, GithubError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        // trailing slash so joins append instead of replacing the last segment
        let base_url = url::Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, GithubError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GithubError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GitHub Enterprise serves GraphQL at `/api/graphql` next to the REST
    /// root `/api/v3`.
    fn graphql_endpoint(&self) -> Result<url::Url, GithubError> {
        match self.base_url.as_str().strip_suffix("/api/v3/") {
            Some(root) => Ok(url::Url::parse(&format!("{root}/api/graphql"))?),
            None => self.endpoint(&["graphql"]),
        }
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        subject: &str,
    ) -> Result<GraphQlResponse<T>, GithubError> {
        let token = self.token.as_deref().ok_or(GithubError::TokenRequired)?;
        let url = self.graphql_endpoint()?;
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        Ok(check_status(response, subject)?.json().await?)
    }

    async fn get(&self, url: url::Url, subject: &str) -> Result<Response, GithubError> {
        debug!("GET {url}");
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        check_status(response, subject)
    }

    pub async fn fetch_user(&self, username: &str) -> Result<GithubUser, GithubError> {
        let url = self.endpoint(&["users", username])?;
        Ok(self.get(url, username).await?.json().await?)
    }

    pub async fn fetch_repos(&self, username: &str) -> Result<Vec<GithubRepo>, GithubError> {
        let mut url = self.endpoint(&["users", username, "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", "100")
            .append_pair("sort", "updated")
            .append_pair("type", "owner");
        Ok(self.get(url, username).await?.json().await?)
    }

    pub async fn fetch_profile_summary(&self, username: &str) -> Result<ProfileSummary, GithubError> {
        let (user, repos) = futures::try_join!(self.fetch_user(username), self.fetch_repos(username))?;
        Ok(ProfileSummary::build(user, repos))
    }

    /// Daily contribution counts for the last year, oldest first.
    pub async fn fetch_contributions(
        &self,
        username: &str,
    ) -> Result<Vec<ContributionDay>, GithubError> {
        let response = self
            .graphql(CONTRIBUTIONS_QUERY, json!({ "login": username }), username)
            .await?;
        contribution_days(response, username)
    }

    pub async fn fetch_repo(&self, owner: &str, repo: &str) -> Result<RepoDetails, GithubError> {
        let url = self.endpoint(&["repos", owner, repo])?;
        Ok(self.get(url, &format!("{owner}/{repo}")).await?.json().await?)
    }

    /// File paths of the repository at `branch`, blobs only.
    pub async fn fetch_tree(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<String>, GithubError> {
        let mut url = self.endpoint(&["repos", owner, repo, "git", "trees", branch])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: TreeResponse = self.get(url, &format!("{owner}/{repo}")).await?.json().await?;
        if tree.truncated {
            warn!("Tree for {owner}/{repo} was truncated by GitHub");
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }
}

fn check_status(response: Response, subject: &str) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");

    match status {
        StatusCode::NOT_FOUND => Err(GithubError::NotFound(subject.to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if exhausted => {
            Err(GithubError::RateLimited)
        }
        StatusCode::TOO_MANY_REQUESTS => Err(GithubError::RateLimited),
        other => Err(GithubError::Status(other.as_u16())),
    }
}
