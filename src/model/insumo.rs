use crate::common::ValidationError;
use serde::{Deserialize, Serialize};

/// 物料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insumo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub codigo: String,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub quantidade_critica: Option<i32>,
    #[serde(default)]
    pub quantidade_estoque: Option<i32>,
}

impl Insumo {
    /// 与后端校验规则一致
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.codigo.trim().is_empty() {
            return Err(ValidationError::new("codigo", "Código é obrigatório"));
        }
        if self.nome.trim().is_empty() {
            return Err(ValidationError::new("nome", "Nome é obrigatório"));
        }
        match self.quantidade_critica {
            None => Err(ValidationError::new(
                "quantidade_critica",
                "Quantidade crítica é obrigatória",
            )),
            Some(q) if q < 0 => Err(ValidationError::new(
                "quantidade_critica",
                "Quantidade crítica deve ser no mínimo 0",
            )),
            Some(_) => Ok(()),
        }
    }
}
