use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::Utc;
use log::info;
use std::net::{IpAddr, SocketAddr};

use crate::{
    cancellable_sse::create_cancellable_sse_stream,
    error::AppError,
    models::{ProfileAnalysis, ThemeRecommendation},
    services::{
        analysis::{analyze_profile, recommend_theme},
        github::{is_valid_repo_name, is_valid_username},
        portfolio::generate_portfolio,
        readme_agent::generate_readme,
        visualizer::generate_diagram,
        wrapped::generate_wrapped,
    },
    state::AppState,
    types::{AnalyzeRequest, PortfolioRequest, ReadmeRequest, VisualizeRequest, WrappedRequest},
};

fn validate_username(username: &str) -> Result<(), AppError> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("'{username}' is not a valid GitHub username")))
    }
}

/// The usage key of a request: the first address in the configured
/// forwarding header when it parses, otherwise the peer address.
fn client_key(headers: &HeaderMap, peer: SocketAddr, header: Option<&str>) -> String {
    header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| peer.ip())
        .to_string()
}

fn charge(state: &AppState, headers: &HeaderMap, addr: SocketAddr) -> Result<(), AppError> {
    let client = client_key(headers, addr, state.client_ip_header.as_deref());
    let remaining = state
        .usage
        .check_and_increment(&client, Utc::now().date_naive())?;
    info!("Client {client} has {remaining} generations left today");
    Ok(())
}

/// Client-chosen ids let the page cancel its own stream; otherwise mint one.
fn stream_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.is_empty() && id.len() <= 64)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub async fn readme_stream_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut request): Json<ReadmeRequest>,
) -> Result<Response, AppError> {
    request.username = request.username.trim().to_string();
    validate_username(&request.username)?;
    charge(&state, &headers, addr)?;

    let stream_id = stream_id(request.stream_id.take());
    info!("Starting README stream {stream_id} for {}", request.username);

    let (gemini, github) = (state.gemini.clone(), state.github.clone());
    Ok(create_cancellable_sse_stream(state.sse_state, stream_id, move |tx| {
        generate_readme(gemini, github, request, tx)
    })
    .await)
}

pub async fn wrapped_stream_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut request): Json<WrappedRequest>,
) -> Result<Response, AppError> {
    request.username = request.username.trim().to_string();
    validate_username(&request.username)?;
    if let Some(year) = request.year {
        let current = chrono::Datelike::year(&Utc::now());
        if !(2008..=current).contains(&year) {
            return Err(AppError::BadRequest(format!("No Wrapped available for {year}")));
        }
    }
    charge(&state, &headers, addr)?;

    let stream_id = stream_id(request.stream_id.take());
    info!("Starting Wrapped stream {stream_id} for {}", request.username);

    let (gemini, github) = (state.gemini.clone(), state.github.clone());
    Ok(create_cancellable_sse_stream(state.sse_state, stream_id, move |tx| {
        generate_wrapped(gemini, github, request, tx)
    })
    .await)
}

pub async fn visualize_stream_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut request): Json<VisualizeRequest>,
) -> Result<Response, AppError> {
    request.owner = request.owner.trim().to_string();
    request.repo = request.repo.trim().to_string();
    validate_username(&request.owner)?;
    if !is_valid_repo_name(&request.repo) {
        return Err(AppError::BadRequest(format!(
            "'{}' is not a valid repository name",
            request.repo
        )));
    }
    charge(&state, &headers, addr)?;

    let stream_id = stream_id(request.stream_id.take());
    info!(
        "Starting diagram stream {stream_id} for {}/{}",
        request.owner, request.repo
    );

    let (gemini, github) = (state.gemini.clone(), state.github.clone());
    Ok(create_cancellable_sse_stream(state.sse_state, stream_id, move |tx| {
        generate_diagram(gemini, github, request, tx)
    })
    .await)
}

pub async fn portfolio_stream_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut request): Json<PortfolioRequest>,
) -> Result<Response, AppError> {
    request.username = request.username.trim().to_string();
    validate_username(&request.username)?;
    charge(&state, &headers, addr)?;

    let stream_id = stream_id(request.stream_id.take());
    let theme = state.widgets.theme(request.theme.as_deref()).clone();
    info!("Starting portfolio stream {stream_id} for {}", request.username);

    let (gemini, github) = (state.gemini.clone(), state.github.clone());
    Ok(create_cancellable_sse_stream(state.sse_state, stream_id, move |tx| {
        generate_portfolio(gemini, github, request, theme, tx)
    })
    .await)
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ProfileAnalysis>, AppError> {
    let username = request.username.trim();
    validate_username(username)?;
    charge(&state, &headers, addr)?;

    let analysis = analyze_profile(&state.gemini, &state.github, username).await?;
    Ok(Json(analysis))
}

pub async fn recommend_theme_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ThemeRecommendation>, AppError> {
    let username = request.username.trim();
    validate_username(username)?;
    charge(&state, &headers, addr)?;

    let pick = recommend_theme(&state.gemini, &state.github, &state.widgets, username).await?;
    Ok(Json(pick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::offline_state;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.0.0.7:51000".parse().unwrap()
    }

    #[test]
    fn stream_id_keeps_reasonable_client_ids() {
        assert_eq!(stream_id(Some("panel-1".into())), "panel-1");
        assert_eq!(stream_id(Some(String::new())).len(), 36);
        assert_eq!(stream_id(Some("x".repeat(65))).len(), 36);
        assert_eq!(stream_id(None).len(), 36);
    }

    #[test]
    fn username_errors_are_bad_requests() {
        let err = validate_username("no spaces allowed").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(validate_username("octocat").is_ok());
    }

    #[test]
    fn client_key_uses_the_peer_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(client_key(&headers, peer(), None), "10.0.0.7");
    }

    #[test]
    fn client_key_honours_the_configured_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(
            client_key(&headers, peer(), Some("x-forwarded-for")),
            "203.0.113.5"
        );
        assert_eq!(client_key(&headers, peer(), Some("x-real-ip")), "10.0.0.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(
            client_key(&headers, peer(), Some("x-forwarded-for")),
            "10.0.0.7"
        );
    }

    #[tokio::test]
    async fn forwarded_clients_get_separate_quotas() {
        let state = offline_state(&[
            ("DAILY_GENERATION_LIMIT", "1"),
            ("CLIENT_IP_HEADER", "X-Forwarded-For"),
        ]);
        let today = Utc::now().date_naive();
        for client in ["198.51.100.1", "198.51.100.2"] {
            let mut headers = HeaderMap::new();
            headers.insert("x-forwarded-for", HeaderValue::from_str(client).unwrap());
            charge(&state, &headers, peer()).unwrap();
            assert_eq!(state.usage.used_today(client, today), 1);
        }
        assert_eq!(state.usage.used_today("10.0.0.7", today), 0);
    }

    #[tokio::test]
    async fn invalid_username_is_rejected_before_anything_starts() {
        let state = offline_state(&[]);
        let request = ReadmeRequest {
            username: "not a user".into(),
            style: Default::default(),
            include_stats: true,
            include_languages: true,
            refine: false,
            stream_id: Some("readme-1".into()),
        };
        let result = readme_stream_handler(
            State(state.clone()),
            ConnectInfo(peer()),
            HeaderMap::new(),
            Json(request),
        )
        .await;

        let err = result.err().unwrap();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(!state.sse_state.is_live("readme-1"));
        assert_eq!(state.usage.used_today("10.0.0.7", Utc::now().date_naive()), 0);

        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn exhausted_quota_is_refused_before_the_stream_opens() {
        let state = offline_state(&[("DAILY_GENERATION_LIMIT", "0")]);
        let request = PortfolioRequest {
            username: "octocat".into(),
            theme: None,
            stream_id: Some("portfolio-1".into()),
        };
        let result = portfolio_stream_handler(
            State(state.clone()),
            ConnectInfo(peer()),
            HeaderMap::new(),
            Json(request),
        )
        .await;

        assert!(matches!(result, Err(AppError::Usage(_))));
        assert!(!state.sse_state.is_live("portfolio-1"));
    }
}
