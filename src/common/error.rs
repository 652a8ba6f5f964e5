use std::io;
use thiserror::Error;

/// 令牌解码错误（令牌结构、base64 或声明 JSON 不合法）
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a valid claims record: {0}")]
    Json(#[from] serde_json::Error),
}

/// 登录（凭证交换）错误
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credentials rejected (HTTP {status})")]
    Rejected { status: u16, body: String },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("issued token cannot be decoded: {0}")]
    InvalidToken(#[from] TokenDecodeError),

    #[error("login superseded by a later logout")]
    Superseded,
}

/// 客户端字段校验错误
#[derive(Debug, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenDecodeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not logged in")]
    NotAuthenticated,

    #[error("no backend user matches {0}")]
    UnknownUser(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

pub type AppResult<T> = Result<T, AppError>;
