use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// The closed set of failures the protocol reports to peers.
///
/// Every kind has a stable machine code, a human message and a fixed HTTP
/// status. Infrastructure failures collapse into [`ErrorKind::Internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidHello,
    InvalidJson,
    EmptyBody,
    EmptyFields,
    EmptyStruct,
    NoSession,
    CannotDecrypt,
    NoRefreshToken,
    NoIntegrity,
    InvalidIntegrity,
    ContextExpired,
    AccountExists,
    IncorrectPassword,
    InvalidUserId,
    UserNotFound,
    ApplicationExists,
    InvalidOwner,
    InvalidApp,
    InvalidLicense,
    ExpiredLicense,
    InvalidFingerprint,
    InsecurePassword,
    IncorrectLength,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidHello => "invalid_hello",
            ErrorKind::InvalidJson => "invalid_json",
            ErrorKind::EmptyBody => "empty_body",
            ErrorKind::EmptyFields => "empty_fields",
            ErrorKind::EmptyStruct => "empty_struct",
            ErrorKind::NoSession => "no_session",
            ErrorKind::CannotDecrypt => "cannot_decrypt",
            ErrorKind::NoRefreshToken => "no_refresh_token",
            ErrorKind::NoIntegrity => "no_integrity",
            ErrorKind::InvalidIntegrity => "invalid_integrity",
            ErrorKind::ContextExpired => "context_expired",
            ErrorKind::AccountExists => "account_exists",
            ErrorKind::IncorrectPassword => "incorrect_password",
            ErrorKind::InvalidUserId => "invalid_user_id",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::ApplicationExists => "application_exists",
            ErrorKind::InvalidOwner => "invalid_owner",
            ErrorKind::InvalidApp => "invalid_app",
            ErrorKind::InvalidLicense => "invalid_license",
            ErrorKind::ExpiredLicense => "expired_license",
            ErrorKind::InvalidFingerprint => "invalid_fingerprint",
            ErrorKind::InsecurePassword => "insecure_password",
            ErrorKind::IncorrectLength => "incorrect_length",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Internal => "internal",
        }
    }

    /// Message shown to the peer.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::InvalidHello => "Improper Hello Payload.",
            ErrorKind::InvalidJson => "Invalid JSON.",
            ErrorKind::EmptyBody => "Request body is empty.",
            ErrorKind::EmptyFields => "One or more fields are empty.",
            ErrorKind::EmptyStruct => "Empty data.",
            ErrorKind::NoSession => "No sessions found. Please create one.",
            ErrorKind::CannotDecrypt => "Could not decrypt. Please verify encryption.",
            ErrorKind::NoRefreshToken => "No refresh token found.",
            ErrorKind::NoIntegrity => "No integrity signature found. Could be an attacker.",
            ErrorKind::InvalidIntegrity => "Integrity signature is invalid. Could be an attacker.",
            ErrorKind::ContextExpired => "Context window has passed.",
            ErrorKind::AccountExists => "Account already exists.",
            ErrorKind::IncorrectPassword => "Incorrect password.",
            ErrorKind::InvalidUserId => "Invalid UserID Provided.",
            ErrorKind::UserNotFound => "User not found.",
            ErrorKind::ApplicationExists => "Application already exists.",
            ErrorKind::InvalidOwner => "Invalid Owner ID.",
            ErrorKind::InvalidApp => "Invalid Application ID.",
            ErrorKind::InvalidLicense => "Invalid license key.",
            ErrorKind::ExpiredLicense => "License key has expired.",
            ErrorKind::InvalidFingerprint => {
                "Authority fingerprint is invalid. You may only use a license on one device."
            }
            ErrorKind::InsecurePassword => "Insecure password. Please change it.",
            ErrorKind::IncorrectLength => {
                "Your username is an incorrect length. Length must be between 3 and 20."
            }
            ErrorKind::Unauthorized => "Unauthorized.",
            ErrorKind::Internal => "Internal server error.",
        }
    }

    /// HTTP status for the plain (unencrypted) error response.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::IncorrectLength | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A protocol, crypto or validation failure with a fixed wire representation.
    #[error("{0}")]
    Kind(ErrorKind),

    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A database pool error.
    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A database pool configuration error.
    #[error("Database pool setup error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON encoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] sonic_rs::Error),

    /// A token signing or decoding error.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// An outbound HTTP error (client side).
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A WebSocket transport error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A key agreement failure. Fatal to the handshake attempt.
    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A request refused by the server (client side).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<ErrorKind> for AppError {
    fn from(kind: ErrorKind) -> Self {
        AppError::Kind(kind)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl From<axum::Error> for AppError {
    fn from(e: axum::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl AppError {
    /// The wire-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Kind(kind) => *kind,
            AppError::Token(_) => ErrorKind::Unauthorized,
            _ => ErrorKind::Internal,
        }
    }

    /// Logs the error at a level matching its severity.
    pub fn log(&self) {
        match self.kind() {
            ErrorKind::Internal => tracing::error!("❌ {}", self),
            ErrorKind::Unauthorized | ErrorKind::InvalidIntegrity | ErrorKind::NoIntegrity => {
                tracing::warn!("⚠️  {}", self)
            }
            _ => tracing::debug!("Request rejected: {} ({})", self, self.kind().code()),
        }
    }
}

#[derive(Serialize)]
struct PlainError<'a> {
    success: bool,
    error: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let kind = self.kind();

        let body = sonic_rs::to_string(&PlainError {
            success: false,
            error: kind.message(),
        })
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal server error."}"#.to_string());

        (
            kind.status(),
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
