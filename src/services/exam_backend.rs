//! 考试协作服务 - 业务能力层
//!
//! 会话控制器只通过 `ExamBackend` 与外部文本生成服务交流：
//! 发出一个 `ExamRequest`，收到一个 `ExamReply`。

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::models::{ExamReply, ExamRequest};

/// 考试协作服务
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// 发送一次请求并等待回复
    async fn send(&self, request: &ExamRequest) -> Result<ExamReply, BackendError>;
}

/// 通过 HTTP 转发到外部协作服务
///
/// 请求以 JSON 形式 POST 到 `{base_url}/api/chat`
pub struct HttpExamBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExamBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExamBackend for HttpExamBackend {
    async fn send(&self, request: &ExamRequest) -> Result<ExamReply, BackendError> {
        debug!("📤 POST {} (序号 {})", self.endpoint, request.sequence);

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("协作服务返回错误状态: {}", status);
            return Err(BackendError::BadStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::MalformedReply(e.to_string()))
    }
}
