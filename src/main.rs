use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::{
            body::Body as AxumBody,
            extract::State,
            http::Request,
            response::IntoResponse,
            routing::{get, post},
            middleware,
            Router,
        };
        use chrono::Utc;
        use dotenv::dotenv;
        use env_logger::Env;
        use gitskins::app::*;
        use gitskins::cancellable_sse::cancel_stream;
        use gitskins::config::AppConfig;
        use gitskins::handlers::*;
        use gitskins::middleware::trace_requests;
        use gitskins::state::AppState;
        use leptos::prelude::*;
        use leptos_axum::{generate_route_list, LeptosRoutes};
        use std::net::SocketAddr;
        use std::time::Duration;

        const USAGE_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            dotenv().ok();
            env_logger::init_from_env(Env::default().default_filter_or("info"));

            let config = AppConfig::from_env()?;
            log::info!(
                "Using model {} with a daily limit of {} generations",
                config.gemini_model,
                config.usage.daily_generations
            );
            match &config.client_ip_header {
                Some(header) => log::info!("Keying usage by the {header} header"),
                None => log::info!("Keying usage by peer address"),
            }

            let conf = get_configuration(None)?;
            let addr = conf.leptos_options.site_addr;
            let leptos_options = conf.leptos_options;

            // Generate the list of routes in your Leptos App
            let routes = generate_route_list(App);

            let app_state = AppState::new(leptos_options.clone(), &config)?;

            let usage = app_state.usage.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(USAGE_PRUNE_INTERVAL);
                loop {
                    interval.tick().await;
                    usage.prune(Utc::now().date_naive());
                }
            });

            let api_routes = Router::new()
                .route("/api/stream/readme", post(readme_stream_handler))
                .route("/api/stream/wrapped", post(wrapped_stream_handler))
                .route("/api/stream/visualize", post(visualize_stream_handler))
                .route("/api/stream/portfolio", post(portfolio_stream_handler))
                .route("/api/stream/cancel", post(cancel_stream))
                .route("/api/analyze", post(analyze_handler))
                .route("/api/recommend-theme", post(recommend_theme_handler))
                .route("/api/widgets/{kind}/{username}", get(widget_handler));

            let app = Router::new()
                .merge(api_routes)
                .leptos_routes_with_handler(routes, get(|State(app_state): State<AppState>, request: Request<AxumBody>| async move {
                    let handler = leptos_axum::render_app_to_stream_with_context(
                        move || {
                            provide_context(app_state.clone());
                        },
                        move || shell(leptos_options.clone())
                    );
                    handler(request).await.into_response()
                }))
                .fallback(leptos_axum::file_and_error_handler::<AppState, _>(shell))
                .layer(middleware::from_fn(trace_requests))
                .with_state(app_state);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            log::info!("listening on http://{}", &addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
            Ok(())
        }
    } else {
        pub fn main() {
            // no client-side main function
            // see lib.rs for hydration function instead
        }
    }
}
