use crate::common::{AppError, AuthError, TokenDecodeError};
use crate::conf::{ApiConfig, Settings};
use crate::model::{LoginRequest, Session, TokenClaims, TokenResponse, UserIdentity};
use crate::service::storage::{SessionStorage, TOKEN_KEY, USER_KEY};
use crate::service::token;
use crate::util;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 持有当前客户端会话：登录、登出、身份与角色查询
pub struct SessionManager {
    api: ApiConfig,
    token_url: String,
    timeout: Duration,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Session>,
    // 每次登出递增；登录完成时代数已变化则丢弃结果
    generation: AtomicU64,
}

impl SessionManager {
    /// 创建管理器并从存储中恢复会话
    pub fn new(settings: &Settings, storage: Arc<dyn SessionStorage>) -> Self {
        let restored = restore(storage.as_ref());
        let (state, _) = watch::channel(restored);

        Self {
            api: settings.api.clone(),
            token_url: settings.token_url(),
            timeout: Duration::from_secs(settings.api.timeout_secs),
            storage,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// 使用密码模式交换令牌；失败时不改变已保存的状态
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, AuthError> {
        let started = self.generation.load(Ordering::SeqCst);
        let username = credentials.username.as_str();
        tracing::debug!("requesting token for {}", username);

        let response = util::CLIENT
            .post(&self.token_url)
            .timeout(self.timeout)
            .basic_auth(&self.api.client_id, Some(&self.api.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!("login rejected with HTTP {}", status);
            tracing::debug!("rejected login was for {}", username);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let issued: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        if issued.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "empty access_token".to_string(),
            ));
        }

        let claims = token::decode_claims(&issued.access_token)?;
        let session = Session {
            token: Some(issued.access_token),
            user: Some(UserIdentity::from(&claims)),
        };

        // 与 logout 在同一把锁下比较代数并写入
        let applied = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != started {
                return false;
            }
            self.persist(&session);
            *current = session.clone();
            true
        });

        if !applied {
            tracing::warn!("login finished after logout, discarding");
            return Err(AuthError::Superseded);
        }

        tracing::info!("logged in ({} roles)", claims.authorities.len());
        tracing::debug!("session user is {}", username);
        Ok(session)
    }

    /// 清空内存与存储中的会话；可重复调用
    pub fn logout(&self) {
        let changed = self.state.send_if_modified(|current| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            wipe(self.storage.as_ref());
            let was_empty = current.is_empty();
            *current = Session::default();
            !was_empty
        });

        if changed {
            tracing::info!("logged out");
        }
    }

    /// 存在令牌且其过期时间严格晚于当前时间
    pub fn is_authenticated(&self) -> bool {
        self.state
            .borrow()
            .token
            .as_deref()
            .is_some_and(|t| token::is_token_valid(t, Utc::now()))
    }

    /// 令牌过期时销毁会话；返回是否仍然有效
    pub fn validate(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        if !self.state.borrow().is_empty() {
            tracing::info!("session token expired or unreadable, clearing session");
            self.logout();
        }
        false
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|u| u.roles.contains(role))
    }

    pub fn has_any_role<I, S>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles.into_iter().any(|r| self.has_role(r.as_ref()))
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.state.borrow().user.clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// 每次登录或登出后收到通知
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn state_for_tests(&self, token: String) {
        let user = token::decode_claims(&token).ok().map(|c| UserIdentity::from(&c));
        self.state.send_replace(Session {
            token: Some(token),
            user,
        });
    }

    fn persist(&self, session: &Session) {
        if let Some(token) = &session.token {
            if let Err(e) = self.storage.set(TOKEN_KEY, token) {
                tracing::warn!("failed to persist token: {}", e);
            }
        }
        if let Some(user) = &session.user {
            let result = serde_json::to_string(user)
                .map_err(AppError::from)
                .and_then(|json| self.storage.set(USER_KEY, &json));
            if let Err(e) = result {
                tracing::warn!("failed to persist user record: {}", e);
            }
        }
    }
}

fn wipe(storage: &dyn SessionStorage) {
    for key in [TOKEN_KEY, USER_KEY] {
        if let Err(e) = storage.remove(key) {
            tracing::warn!("failed to remove {} from storage: {}", key, e);
        }
    }
}

/// 从存储恢复；令牌过期或无法解码时清空存储
fn restore(storage: &dyn SessionStorage) -> Session {
    let Some(stored_token) = storage.get(TOKEN_KEY) else {
        if storage.get(USER_KEY).is_some() {
            wipe(storage);
        }
        return Session::default();
    };

    let claims: Result<TokenClaims, TokenDecodeError> = token::decode_claims(&stored_token);
    let claims = match claims {
        Ok(claims) if !claims.is_expired() => claims,
        Ok(_) => {
            tracing::info!("stored token has expired, discarding session");
            wipe(storage);
            return Session::default();
        }
        Err(e) => {
            tracing::warn!("stored token is unreadable ({}), discarding session", e);
            wipe(storage);
            return Session::default();
        }
    };

    let user = storage
        .get(USER_KEY)
        .and_then(|json| serde_json::from_str::<UserIdentity>(&json).ok())
        .unwrap_or_else(|| UserIdentity::from(&claims));

    tracing::debug!("restored session for {}", user.username);
    Session {
        token: Some(stored_token),
        user: Some(user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::storage::{MemoryStorage, NoStorage};
    use crate::test_support::{
        future_exp, past_exp, settings_for, token_with, CannedResponse, MockBackend,
    };
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::time::Duration;

    fn credentials(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn token_body(token: &str) -> String {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3600,
        })
        .to_string()
    }

    async fn backend_with(responses: Vec<CannedResponse>) -> (MockBackend, Settings) {
        let backend = MockBackend::start(responses).await;
        let settings = settings_for(&backend.base_url);
        (backend, settings)
    }

    #[tokio::test]
    async fn test_login_success_populates_session_and_storage() {
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN", "ROLE_USER"], future_exp());
        let (backend, settings) =
            backend_with(vec![CannedResponse::json(200, token_body(&token))]).await;
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(&settings, storage.clone());

        let session = manager.login(&credentials("ana", "segredo")).await.unwrap();
        assert_eq!(session.token.as_deref(), Some(token.as_str()));
        assert!(manager.is_authenticated());
        assert!(manager.has_role("ROLE_ADMIN"));
        assert!(!manager.has_role("ROLE_ROOT"));
        assert!(manager.has_any_role(["ROLE_ROOT", "ROLE_USER"]));
        assert!(!manager.has_any_role(Vec::<String>::new()));

        let user = manager.current_user().unwrap();
        assert_eq!(user.subject, "ana@lanchonete.com");
        assert_eq!(user.username, "ana");

        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some(token.as_str()));
        assert!(storage.get(USER_KEY).is_some());

        assert_eq!(backend.request_line(0), "POST /oauth2/token HTTP/1.1");
        let expected_auth = format!("Basic {}", STANDARD.encode("myclientid:myclientsecret"));
        assert_eq!(backend.header(0, "authorization"), Some(expected_auth));
        assert_eq!(
            backend.header(0, "content-type").as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            backend.body(0),
            "grant_type=password&username=ana&password=segredo"
        );
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_existing_state() {
        let first = token_with("ana@lanchonete.com", &["ROLE_ADMIN"], future_exp());
        let (_backend, settings) = backend_with(vec![
            CannedResponse::json(200, token_body(&first)),
            CannedResponse::json(401, r#"{"error":"invalid_grant"}"#),
        ])
        .await;
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(&settings, storage.clone());
        manager.login(&credentials("ana", "segredo")).await.unwrap();

        let err = manager.login(&credentials("ana", "errada")).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert_eq!(manager.token().as_deref(), Some(first.as_str()));
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_login_malformed_responses() {
        let (_backend, settings) = backend_with(vec![
            CannedResponse::json(200, "not json"),
            CannedResponse::json(200, r#"{"access_token":""}"#),
            CannedResponse::json(200, r#"{"access_token":"abc"}"#),
        ])
        .await;
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(&settings, storage.clone());

        assert!(matches!(
            manager.login(&credentials("a", "b")).await,
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            manager.login(&credentials("a", "b")).await,
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            manager.login(&credentials("a", "b")).await,
            Err(AuthError::InvalidToken(TokenDecodeError::MissingPayload))
        ));
        assert!(manager.session().is_empty());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_login_transport_error() {
        // 端口 1 上没有服务
        let settings = settings_for("http://127.0.0.1:1");
        let manager = SessionManager::new(&settings, Arc::new(NoStorage));
        assert!(matches!(
            manager.login(&credentials("a", "b")).await,
            Err(AuthError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_everything_and_is_idempotent() {
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN"], future_exp());
        let (_backend, settings) =
            backend_with(vec![CannedResponse::json(200, token_body(&token))]).await;
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(&settings, storage.clone());
        manager.login(&credentials("ana", "segredo")).await.unwrap();

        manager.logout();
        assert!(!manager.is_authenticated());
        assert!(!manager.has_role("ROLE_ADMIN"));
        assert!(manager.current_user().is_none());
        assert!(storage.is_empty());

        manager.logout();
        assert!(manager.session().is_empty());
    }

    #[tokio::test]
    async fn test_logout_wins_over_pending_login() {
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN"], future_exp());
        let (_backend, settings) = backend_with(vec![CannedResponse::json(
            200,
            token_body(&token),
        )
        .delayed(Duration::from_millis(300))])
        .await;
        let storage = Arc::new(MemoryStorage::new());
        let manager = Arc::new(SessionManager::new(&settings, storage.clone()));

        let pending = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.login(&credentials("ana", "segredo")).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.logout();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(AuthError::Superseded)));
        assert!(!manager.is_authenticated());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let token = token_with("ana@lanchonete.com", &[], future_exp());
        let (_backend, settings) =
            backend_with(vec![CannedResponse::json(200, token_body(&token))]).await;
        let manager = SessionManager::new(&settings, Arc::new(NoStorage));
        let mut rx = manager.subscribe();

        manager.login(&credentials("ana", "segredo")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().user.is_some());

        manager.logout();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_no_storage_still_keeps_in_memory_session() {
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN"], future_exp());
        let (_backend, settings) =
            backend_with(vec![CannedResponse::json(200, token_body(&token))]).await;
        let manager = SessionManager::new(&settings, Arc::new(NoStorage));
        manager.login(&credentials("ana", "segredo")).await.unwrap();
        assert!(manager.is_authenticated());

        let fresh = SessionManager::new(&settings, Arc::new(NoStorage));
        assert!(!fresh.is_authenticated());
    }

    #[test]
    fn test_rehydrate_reproduces_roles_and_authentication() {
        let settings = settings_for("http://127.0.0.1:1");
        let storage = Arc::new(MemoryStorage::new());
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN", "ROLE_USER"], future_exp());
        let user = UserIdentity::from(&token::decode_claims(&token).unwrap());
        storage.set(TOKEN_KEY, &token).unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&user).unwrap())
            .unwrap();

        let manager = SessionManager::new(&settings, storage.clone());
        assert!(manager.is_authenticated());
        assert_eq!(manager.current_user(), Some(user));
        assert!(manager.has_role("ROLE_USER"));
    }

    #[test]
    fn test_rehydrate_derives_user_when_record_missing() {
        let settings = settings_for("http://127.0.0.1:1");
        let storage = Arc::new(MemoryStorage::new());
        let token = token_with("ana@lanchonete.com", &["ROLE_ADMIN"], future_exp());
        storage.set(TOKEN_KEY, &token).unwrap();
        storage.set(USER_KEY, "{broken").unwrap();

        let manager = SessionManager::new(&settings, storage);
        assert!(manager.has_role("ROLE_ADMIN"));
        assert_eq!(manager.current_user().unwrap().username, "ana");
    }

    #[test]
    fn test_rehydrate_discards_expired_or_malformed_token() {
        let settings = settings_for("http://127.0.0.1:1");

        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(TOKEN_KEY, &token_with("a", &["ROLE_ADMIN"], past_exp()))
            .unwrap();
        storage.set(USER_KEY, r#"{"subject":"a","username":"a"}"#).unwrap();
        let manager = SessionManager::new(&settings, storage.clone());
        assert!(!manager.is_authenticated());
        assert!(!manager.has_role("ROLE_ADMIN"));
        assert!(storage.is_empty());

        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "x.!!!.y").unwrap();
        let manager = SessionManager::new(&settings, storage.clone());
        assert!(!manager.is_authenticated());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_validate_clears_expired_session() {
        let settings = settings_for("http://127.0.0.1:1");
        let manager = SessionManager::new(&settings, Arc::new(NoStorage));
        manager.state_for_tests(token_with("a", &["ROLE_ADMIN"], past_exp()));

        assert!(manager.has_role("ROLE_ADMIN"));
        assert!(!manager.is_authenticated());
        assert!(!manager.validate());
        assert!(manager.session().is_empty());
    }
}
