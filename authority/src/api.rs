//! # Trust Authority HTTP API
//!
//! Builds the axum router that exposes the protocol operations. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path             | Description                                 |
//! |--------|------------------|---------------------------------------------|
//! | GET    | `/health`        | Liveness probe                              |
//! | GET    | `/params`        | Public IBE parameters                       |
//! | POST   | `/register`      | Start registration, deliver a one-time code |
//! | POST   | `/verify-otp`    | Consume the code → TOTP secret + URI        |
//! | POST   | `/verify-totp`   | Standalone TOTP check                       |
//! | POST   | `/private-key`   | TOTP-gated private-key issuance             |
//! | POST   | `/check-account` | Account existence/verification snapshot     |
//!
//! Field names are fixed for client compatibility: `identity` (alias
//! `email`), `otp` (alias `code`), `totpCode`, `totpSecret`, `qrCodeUri`
//! (mirrored as `provisioningUri`), `privateKey`, `authenticated`,
//! `exists`, `verified`.
//!
//! Error bodies are deliberately terse. Internal failures never echo the
//! master secret, key material, or low-level error text.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use veil_protocol::error::AuthorityError;
use veil_protocol::ibe::params::PublicParametersWire;
use veil_protocol::TrustAuthority;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The server's reported version string.
    pub version: String,
    /// The trust authority: master-secret holder and key issuer.
    pub authority: Arc<TrustAuthority>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured HTTP port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/params", get(params_handler))
        .route("/register", post(register_handler))
        .route("/verify-otp", post(verify_otp_handler))
        .route("/verify-totp", post(verify_totp_handler))
        .route("/private-key", post(private_key_handler))
        .route("/check-account", post(check_account_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body for `POST /register` and `POST /check-account`.
#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    /// The email identity. `email` accepted as a legacy alias.
    #[serde(alias = "email")]
    pub identity: String,
}

/// Body for `POST /verify-otp`.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(alias = "email")]
    pub identity: String,
    /// The one-time code. `code` accepted as a legacy alias.
    #[serde(alias = "code")]
    pub otp: String,
}

/// Body for `POST /verify-totp` and `POST /private-key`.
#[derive(Debug, Deserialize)]
pub struct TotpRequest {
    #[serde(alias = "email")]
    pub identity: String,
    #[serde(rename = "totpCode")]
    pub totp_code: String,
}

/// Response payload for `POST /register`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub identity: String,
    /// Always `"accepted"` on success — the code travels by mail, not in
    /// this response.
    pub status: String,
}

/// Response payload for `POST /verify-otp`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpResponse {
    /// Base32-encoded TOTP secret, shown exactly once.
    #[serde(rename = "totpSecret")]
    pub totp_secret: String,
    /// The otpauth:// URI, under its historical field name.
    #[serde(rename = "qrCodeUri")]
    pub qr_code_uri: String,
    /// Same URI under the descriptive name newer clients use.
    #[serde(rename = "provisioningUri")]
    pub provisioning_uri: String,
}

/// Response payload for `POST /verify-totp`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyTotpResponse {
    pub authenticated: bool,
}

/// Response payload for `POST /private-key`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrivateKeyResponse {
    pub identity: String,
    /// Hex-encoded compressed private key.
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

/// Response payload for `POST /check-account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckAccountResponse {
    pub exists: bool,
    pub verified: bool,
}

/// Generic error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Wraps [`AuthorityError`] for axum, mapping each category to a status
/// code and a body safe to show anyone.
pub struct ApiError(AuthorityError);

impl From<AuthorityError> for ApiError {
    fn from(err: AuthorityError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AuthorityError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthorityError::State(err) => (StatusCode::CONFLICT, err.to_string()),
            AuthorityError::Authorization => {
                (StatusCode::UNAUTHORIZED, "authorization failed".to_string())
            }
            // Crypto and transport details stay server-side; the log has
            // them, the client doesn't need them.
            AuthorityError::Crypto(_) => {
                tracing::warn!(error = %self.0, "cryptographic failure");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "cryptographic failure".to_string(),
                )
            }
            AuthorityError::Transport(_) => {
                tracing::warn!(error = %self.0, "transport failure");
                (StatusCode::BAD_GATEWAY, "delivery failed".to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the authority is alive.
///
/// This is the liveness probe for orchestrators. It intentionally checks
/// nothing beyond "the process answers".
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `GET /params` — the public IBE parameters.
///
/// Idempotent: every call returns the identical generator/public-key pair
/// for the process lifetime. The master secret has no representation in
/// this response type, so it cannot leak here even by accident.
async fn params_handler(State(state): State<AppState>) -> Json<PublicParametersWire> {
    Json(state.authority.public_parameters().to_wire())
}

/// `POST /register` — start (or re-trigger) registration.
///
/// The one-time code goes out by mail; the response only acknowledges
/// acceptance.
async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    state.authority.register(&req.identity).await?;
    Ok(Json(RegisterResponse {
        identity: req.identity.trim().to_lowercase(),
        status: "accepted".to_string(),
    }))
}

/// `POST /verify-otp` — consume the one-time code.
///
/// On success the TOTP secret is returned exactly once, alongside the
/// provisioning URI under both its historical and descriptive names.
async fn verify_otp_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let verified = state.authority.verify_code(&req.identity, &req.otp)?;
    Ok(Json(VerifyOtpResponse {
        totp_secret: verified.totp_secret.to_base32(),
        qr_code_uri: verified.provisioning_uri.clone(),
        provisioning_uri: verified.provisioning_uri,
    }))
}

/// `POST /verify-totp` — standalone TOTP check (the login path).
async fn verify_totp_handler(
    State(state): State<AppState>,
    Json(req): Json<TotpRequest>,
) -> Result<Json<VerifyTotpResponse>, ApiError> {
    let authenticated = state.authority.verify_totp(&req.identity, &req.totp_code)?;
    Ok(Json(VerifyTotpResponse { authenticated }))
}

/// `POST /private-key` — TOTP-gated key issuance.
///
/// A valid code buys the serialized private key; anything else is a 401
/// with no further detail.
async fn private_key_handler(
    State(state): State<AppState>,
    Json(req): Json<TotpRequest>,
) -> Result<Json<PrivateKeyResponse>, ApiError> {
    let private_key = state
        .authority
        .issue_private_key(&req.identity, &req.totp_code)?;
    Ok(Json(PrivateKeyResponse {
        identity: req.identity.trim().to_lowercase(),
        private_key,
    }))
}

/// `POST /check-account` — existence/verification snapshot.
async fn check_account_handler(
    State(state): State<AppState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<CheckAccountResponse>, ApiError> {
    let status = state.authority.check_account(&req.identity)?;
    Ok(Json(CheckAccountResponse {
        exists: status.exists,
        verified: status.verified,
    }))
}
