pub mod auth;
pub mod insumo;
pub mod movimentacao;
pub mod usuario;

pub use auth::{Session, TokenClaims, TokenResponse, UserIdentity};
pub use insumo::Insumo;
pub use movimentacao::{Movimentacao, TipoMovimentacao};
pub use usuario::{LoginRequest, Usuario, ROLE_ADMIN};

use serde::{Deserialize, Serialize};

/// 后端异常响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
}
