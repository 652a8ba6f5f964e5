pub mod dashboard;
pub mod guard;
pub mod session;
pub mod storage;
pub mod token;

pub use dashboard::{DashboardAggregator, DashboardView};
pub use guard::{Gate, GateDecision, Route};
pub use session::SessionManager;
pub use storage::SessionStorage;

use crate::conf::Settings;
use std::sync::Arc;

/// 根据配置创建会话管理器（含存储恢复）
pub fn init_session(settings: &Settings) -> Arc<SessionManager> {
    let storage = storage::from_config(&settings.storage);
    let manager = SessionManager::new(settings, storage);
    tracing::info!(
        "session service initialized (authenticated: {})",
        manager.is_authenticated()
    );
    Arc::new(manager)
}
