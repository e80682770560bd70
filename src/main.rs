use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tilder_backend::{
    AppState,
    config::Config,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'tilder_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
    };

    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    let public_routes = Router::new()
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login))
        // shelter discovery is open so the map works before login
        .route("/shelters", get(routes::shelter::list_nearby))
        .route("/shelters/{id}", get(routes::shelter::get_shelter));

    let protected_routes = Router::new()
        .route("/users/profile", get(routes::user::get_profile))
        .route("/users/profile", put(routes::user::update_profile))
        // occupancy
        .route(
            "/shelters/{id}/enter",
            post(routes::occupancy::enter_shelter),
        )
        .route(
            "/shelters/{id}/leave",
            post(routes::occupancy::leave_shelter),
        )
        // favorites
        .route("/favorites", get(routes::favorite::list_favorites))
        .route("/favorites", post(routes::favorite::add_favorite))
        .route(
            "/favorites/{user_id}",
            delete(routes::favorite::remove_favorite),
        )
        // chat
        .route("/chats", get(routes::chat::list_chats))
        .route("/chats/{user_id}", get(routes::chat::get_chat))
        .route("/chats/{user_id}", post(routes::chat::send_message))
        // notifications
        .route(
            "/notifications",
            get(routes::notification::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(routes::notification::unread_count),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notification::mark_read),
        )
        .route(
            "/notifications/read-all",
            post(routes::notification::mark_all_read),
        )
        .route(
            "/notifications/{id}",
            delete(routes::notification::delete_notification),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new().nest(
        &config.api_base_uri.clone(),
        Router::new().merge(public_routes).merge(protected_routes),
    );

    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
