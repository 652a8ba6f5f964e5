use crate::common::TokenDecodeError;
use crate::model::TokenClaims;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

// JWT 使用 base64url；兼容标准字母表
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// 取出令牌的中间段并解析为声明（不校验签名）
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenDecodeError> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or(TokenDecodeError::MissingPayload)?;

    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))?;

    Ok(serde_json::from_slice(&bytes)?)
}

/// 本地的、仅供参考的有效性判断；解码失败视为无效
pub fn is_token_valid(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.is_valid_at(now),
        Err(e) => {
            tracing::debug!("token rejected: {}", e);
            false
        }
    }
}
