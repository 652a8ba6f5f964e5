use crate::common::ValidationError;
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// 系统用户；`role` 保持多角色模型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usuario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub nome: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(default)]
    pub role: Vec<String>,
}

impl Usuario {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(ValidationError::new("email", "Email inválido"));
        }
        if self.role.is_empty() {
            return Err(ValidationError::new("role", "Perfil é obrigatório"));
        }
        Ok(())
    }
}

/// 登录表单
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
