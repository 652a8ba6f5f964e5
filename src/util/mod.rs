use crate::common::{AppError, AppResult};
use crate::model::ApiErrorBody;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("insumos-admin/", env!("CARGO_PKG_VERSION"));

/// 进程内共享的 HTTP 客户端；超时按请求设置
pub static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .tcp_keepalive(Duration::from_secs(15))
        .tcp_nodelay(true)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| {
            log::warn!("创建HTTP客户端失败，使用默认配置");
            reqwest::Client::new()
        })
});

/// 发送请求并把响应体解析为 JSON
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> AppResult<T> {
    let response = send(request).await?;
    let url = response.url().to_string();

    let response_text = response.text().await.map_err(|e| {
        log::error!("读取响应内容失败: {}, url: {}", e, url);
        AppError::Request(e)
    })?;

    serde_json::from_str::<T>(&response_text).map_err(|e| {
        log::error!("解析API响应失败: {}, url: {}", e, url);
        AppError::SerdeJson(e)
    })
}

/// 发送请求，忽略响应体
pub async fn send_empty(request: reqwest::RequestBuilder) -> AppResult<()> {
    send(request).await.map(|_| ())
}

async fn send(request: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        log::error!("发送请求失败: {}", e);
        AppError::Request(e)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    log::error!("请求失败, HTTP状态码: {}, url: {}", status, url);

    Err(AppError::Api {
        status: status.as_u16(),
        message: error_message(&body, status),
    })
}

/// 优先使用后端异常体中的 message 字段
pub fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}
