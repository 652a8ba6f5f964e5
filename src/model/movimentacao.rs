use crate::common::ValidationError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 后端及前端使用的时间格式
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// 发送给后端时使用的格式
pub const OUTGOING_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoMovimentacao {
    Entrada,
    Saida,
    #[serde(other)]
    Desconhecido,
}

impl TipoMovimentacao {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoMovimentacao::Entrada => "ENTRADA",
            TipoMovimentacao::Saida => "SAIDA",
            TipoMovimentacao::Desconhecido => "DESCONHECIDO",
        }
    }
}

impl fmt::Display for TipoMovimentacao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TipoMovimentacao {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRADA" => Ok(TipoMovimentacao::Entrada),
            "SAIDA" | "SAÍDA" => Ok(TipoMovimentacao::Saida),
            other => Err(ValidationError::new(
                "tipo_movimentacao",
                format!("tipo desconhecido: {}", other),
            )),
        }
    }
}

/// 库存变动记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movimentacao {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub quantidade: i32,
    #[serde(rename = "tipo_movimentacao", alias = "tipo")]
    pub tipo: TipoMovimentacao,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub usuario_id: String,
    pub insumo_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insumo_nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insumo_codigo: Option<String>,
}

impl Movimentacao {
    /// 创建新的变动记录；`usuario_id` 为后端用户表主键
    pub fn new_entry(
        usuario_id: i64,
        insumo_id: i64,
        tipo: TipoMovimentacao,
        quantidade: i32,
        data: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            quantidade,
            tipo,
            data: Some(data.format(OUTGOING_DATE_FORMAT).to_string()),
            usuario_id: usuario_id.to_string(),
            insumo_id,
            insumo_nome: None,
            insumo_codigo: None,
        }
    }

    /// 解析时间戳；缺失或无法解析时返回 None
    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        self.data.as_deref().and_then(parse_timestamp)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantidade < 1 {
            return Err(ValidationError::new(
                "quantidade",
                "Quantidade deve ser maior que zero",
            ));
        }
        if self.tipo == TipoMovimentacao::Desconhecido {
            return Err(ValidationError::new(
                "tipo_movimentacao",
                "Tipo de movimentação é obrigatório",
            ));
        }
        if self.usuario_id.trim().is_empty() {
            return Err(ValidationError::new(
                "usuario_id",
                "ID do usuário é obrigatório",
            ));
        }
        Ok(())
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
