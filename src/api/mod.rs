#![allow(clippy::needless_for_each)]

use crate::{
    api::handlers::{
        health, health::__path_health, history, history::__path_history, login,
        login::__path_login, logout, logout::__path_logout, otp as otp_handlers,
        otp::__path_send_code, otp::__path_verify_code, signup, signup::__path_signup,
    },
    risk::Authenticator,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod geo;
pub(crate) mod handlers;
pub mod notify;
pub mod otp;
pub mod session;

use geo::{GeoResolver, HeaderGeoResolver};
use notify::{LogNotificationSender, NotificationSender};
use otp::OtpStore;
use session::SessionStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 5 * 60;

#[derive(OpenApi)]
#[openapi(
    paths(health, signup, login, send_code, verify_code, logout, history),
    components(schemas(
        health::Health,
        handlers::ErrorBody,
        signup::SignupRequest,
        signup::SignupResponse,
        login::LoginRequest,
        login::LoginResponse,
        otp_handlers::OtpRequest,
        otp_handlers::OtpVerifyRequest,
        history::HistoryResponse,
        history::HistoryEntry,
    )),
    tags(
        (name = "riskgate", description = "Login risk assessment API"),
        (name = "auth", description = "Signup, sign-in and one-time codes")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    otp_ttl_seconds: i64,
}

impl ApiConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    /// Cookies carry `Secure` only when the frontend is served over https.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppState {
    authenticator: Authenticator,
    sessions: SessionStore,
    otp: OtpStore,
    geo: Arc<dyn GeoResolver>,
    notifier: Arc<dyn NotificationSender>,
    config: ApiConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("authenticator", &self.authenticator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[must_use]
    pub fn new(authenticator: Authenticator, config: ApiConfig) -> Self {
        Self {
            authenticator,
            sessions: SessionStore::new(config.session_ttl_seconds()),
            otp: OtpStore::new(config.otp_ttl_seconds()),
            geo: Arc::new(HeaderGeoResolver),
            notifier: Arc::new(LogNotificationSender),
            config,
        }
    }

    #[must_use]
    pub fn with_geo_resolver(mut self, geo: Arc<dyn GeoResolver>) -> Self {
        self.geo = geo;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn otp(&self) -> &OtpStore {
        &self.otp
    }

    #[must_use]
    pub fn geo(&self) -> &dyn GeoResolver {
        self.geo.as_ref()
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn NotificationSender {
        self.notifier.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

/// Routes and request layers, without CORS or a listener.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { env!("CARGO_PKG_NAME") }))
        .route("/v1/auth/signup", post(signup::signup))
        .route("/v1/auth/login", post(login::login))
        .route("/v1/auth/otp", post(otp_handlers::send_code))
        .route("/v1/auth/otp/verify", post(otp_handlers::verify_code))
        .route("/v1/auth/logout", post(logout::logout))
        .route("/v1/me/history", get(history::history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state.clone())),
        )
        .route("/health", get(health::health).options(health::health))
        .layer(Extension(state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let frontend_origin = frontend_origin(state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router(state).layer(cors);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
