//! 单元测试共用：构造令牌，以及按顺序回放预设响应的本地 HTTP 后端。

use crate::conf::Settings;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// 构造三段式令牌，载荷为给定声明
pub fn token_with(sub: &str, authorities: &[&str], exp: i64) -> String {
    encode_token(json!({
        "sub": sub,
        "username": sub.split('@').next().unwrap_or(sub),
        "authorities": authorities,
        "exp": exp,
    }))
}

/// 携带数值用户 ID 的令牌
pub fn token_with_id(sub: &str, id: i64, exp: i64) -> String {
    encode_token(json!({
        "sub": sub,
        "id": id,
        "authorities": [],
        "exp": exp,
    }))
}

fn encode_token(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

pub fn future_exp() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

pub fn past_exp() -> i64 {
    chrono::Utc::now().timestamp() - 3600
}

pub fn settings_for(base_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.api.base_url = base_url.to_string();
    settings.api.timeout_secs = 5;
    settings
}

#[derive(Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
    // 为 None 时匹配任意路径
    pub path: Option<String>,
}

impl CannedResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            path: None,
        }
    }

    /// 只响应指定路径的请求
    pub fn for_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// 本地后端：每个请求消耗一个预设响应
pub struct MockBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub async fn start(responses: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));

        let captured = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let captured = Arc::clone(&captured);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    serve(stream, captured, queue).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_line(&self, index: usize) -> String {
        self.requests()[index]
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn header(&self, index: usize, name: &str) -> Option<String> {
        let request = self.requests()[index].clone();
        let head = request.split("\r\n\r\n").next().unwrap_or_default();
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn body(&self, index: usize) -> String {
        let request = self.requests()[index].clone();
        request
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default()
    }
}

async fn serve(
    mut stream: TcpStream,
    captured: Arc<Mutex<Vec<String>>>,
    queue: Arc<Mutex<VecDeque<CannedResponse>>>,
) {
    let Ok(request) = read_request(&mut stream).await else {
        return;
    };
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    captured.lock().unwrap().push(request);

    let response = {
        let mut queue = queue.lock().unwrap();
        queue
            .iter()
            .position(|r| r.path.as_deref().map_or(true, |p| p == path))
            .and_then(|index| queue.remove(index))
            .unwrap_or_else(|| CannedResponse::json(500, r#"{"message":"no canned response"}"#))
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let raw = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(raw.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 2048];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            if buf.len() >= pos + 4 + content_length(&head) {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
