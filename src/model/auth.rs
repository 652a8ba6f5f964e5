use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 令牌端点的响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// 令牌中携带的声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    /// 后端用户表主键（令牌携带时）
    #[serde(default, alias = "user_id", alias = "usuario_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub authorities: Vec<String>,
    /// 过期时间（秒）
    pub exp: i64,
}

impl TokenClaims {
    /// 仅当 `now` 严格早于过期时间时令牌有效
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() < self.exp.saturating_mul(1000)
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub subject: String,
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl From<&TokenClaims> for UserIdentity {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            subject: claims.sub.clone(),
            id: claims.id,
            username: claims
                .username
                .clone()
                .unwrap_or_else(|| claims.sub.clone()),
            roles: claims.authorities.iter().cloned().collect(),
        }
    }
}

/// 当前客户端会话
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserIdentity>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }
}
