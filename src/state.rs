use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::extract::FromRef;
        use std::sync::Arc;
        use leptos::prelude::LeptosOptions;

        use crate::cancellable_sse::SseState;
        use crate::config::AppConfig;
        use crate::services::{GeminiClient, GithubClient, UsageTracker};
        use crate::services::github::GithubError;
        use crate::widgets::WidgetConfig;

        #[derive(FromRef, Clone)]
        pub struct AppState {
            pub leptos_options: LeptosOptions,
            pub sse_state: SseState,
            pub github: GithubClient,
            pub gemini: GeminiClient,
            pub usage: Arc<UsageTracker>,
            pub widgets: Arc<WidgetConfig>,
            pub client_ip_header: Option<String>,
        }

        impl AppState {
            pub fn new(leptos_options: LeptosOptions, config: &AppConfig) -> Result<Self, GithubError> {
                Ok(Self {
                    leptos_options,
                    sse_state: SseState::new(),
                    github: GithubClient::new(&config.github_base_url, config.github_token.clone())?,
                    gemini: GeminiClient::new(
                        config.gemini_api_key.clone(),
                        config.gemini_model.clone(),
                        config.gemini_base_url.clone(),
                    ),
                    usage: Arc::new(UsageTracker::new(config.usage)),
                    widgets: Arc::new(WidgetConfig::default()),
                    client_ip_header: config.client_ip_header.clone(),
                })
            }
        }

        /// State whose upstream clients point at a closed local port.
        #[cfg(test)]
        pub(crate) fn offline_state(overrides: &[(&str, &str)]) -> AppState {
            let config = AppConfig::from_lookup(|key| {
                overrides
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
                    .or_else(|| match key {
                        "GEMINI_API_KEY" => Some("test-key".to_string()),
                        "GEMINI_BASE_URL" | "GITHUB_API_URL" => Some("http://127.0.0.1:9".to_string()),
                        _ => None,
                    })
            })
            .unwrap();
            let options = LeptosOptions::builder().output_name("gitskins").build();
            AppState::new(options, &config).unwrap()
        }
    }
}
