use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http::header;
use log::warn;
use serde::Deserialize;

use crate::{
    models::StreakStats,
    services::github::{is_valid_username, GithubError},
    state::AppState,
    widgets::{
        render_error_card, render_languages_card, render_profile_card, render_streak_card, Theme,
    },
};

const WIDGET_KINDS: [&str; 3] = ["card", "languages", "streak"];

#[derive(Debug, Deserialize)]
pub struct WidgetQuery {
    pub theme: Option<String>,
}

fn svg(status: StatusCode, body: String, max_age: u32) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "image/svg+xml; charset=utf-8".to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={max_age}")),
        ],
        body,
    )
        .into_response()
}

async fn render_widget(
    state: &AppState,
    kind: &str,
    username: &str,
    theme: &Theme,
) -> Result<String, GithubError> {
    if kind == "streak" {
        let days = state.github.fetch_contributions(username).await?;
        let stats = StreakStats::from_days(&days, Utc::now().date_naive());
        return Ok(render_streak_card(username, &stats, theme));
    }
    let summary = state.github.fetch_profile_summary(username).await?;
    Ok(if kind == "card" {
        render_profile_card(&summary, theme)
    } else {
        render_languages_card(&summary.languages, theme)
    })
}

fn failure_status(error: &GithubError) -> StatusCode {
    match error {
        GithubError::NotFound(_) => StatusCode::NOT_FOUND,
        GithubError::RateLimited | GithubError::TokenRequired => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// `GET /api/widgets/{kind}/{username}`: `kind` is `card`, `languages` or
/// `streak`.
pub async fn widget_handler(
    State(state): State<AppState>,
    Path((kind, username)): Path<(String, String)>,
    Query(query): Query<WidgetQuery>,
) -> Response {
    let theme = state.widgets.theme(query.theme.as_deref());

    if !WIDGET_KINDS.contains(&kind.as_str()) {
        return svg(
            StatusCode::NOT_FOUND,
            render_error_card(&format!("Unknown widget '{kind}'"), theme),
            60,
        );
    }
    if !is_valid_username(&username) {
        return svg(
            StatusCode::BAD_REQUEST,
            render_error_card("Invalid GitHub username", theme),
            60,
        );
    }

    match render_widget(&state, &kind, &username, theme).await {
        Ok(body) => svg(StatusCode::OK, body, 1800),
        Err(e) => {
            warn!("Widget {kind} for {username} failed: {e}");
            svg(failure_status(&e), render_error_card(&e.to_string(), theme), 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::offline_state;

    async fn widget(kind: &str, username: &str) -> Response {
        widget_handler(
            State(offline_state(&[])),
            Path((kind.to_string(), username.to_string())),
            Query(WidgetQuery { theme: None }),
        )
        .await
    }

    #[tokio::test]
    async fn unknown_widget_is_an_svg_404() {
        let response = widget("trophies", "octocat").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "image/svg+xml; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn invalid_username_is_rejected() {
        let response = widget("card", "not valid").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn streak_without_token_is_unavailable() {
        let response = widget("streak", "octocat").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("needs a GitHub token"));
    }

    #[test]
    fn failures_map_to_statuses() {
        assert_eq!(failure_status(&GithubError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(failure_status(&GithubError::Status(500)), StatusCode::BAD_GATEWAY);
        assert_eq!(failure_status(&GithubError::RateLimited), StatusCode::SERVICE_UNAVAILABLE);
    }
}
