//! LLM 服务 - 业务能力层
//!
//! 把带历史的对话发给 OpenAI 兼容接口（`async-openai`），返回纯文本。
//! 端点、模型和密钥都来自 `Config`，不认识考试流程。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::BackendError;
use crate::models::{ChatMessage, Role};

/// 文本生成能力
///
/// 直连 LLM 的协作服务只依赖这个接口，测试中可以换成脚本化实现
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system_message: Option<&str>,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, BackendError>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 生成回复
/// - 不认识考试状态
/// - 不解析回复内容
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: 0.3,
            max_tokens: 4096,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, BackendError> {
        self.chat(system_message, &[], user_message).await
    }

    /// 带历史的对话调用
    ///
    /// # 参数
    /// - `system_message`: 系统消息（可选）
    /// - `history`: 之前的对话（按时间顺序）
    /// - `user_message`: 本轮用户消息
    ///
    /// # 示例
    /// ```no_run
    /// # use mock_exam::services::LlmService;
    /// # use mock_exam::models::ChatMessage;
    /// # async fn example(service: &LlmService) -> Result<(), mock_exam::error::BackendError> {
    /// let history = vec![ChatMessage::assistant("Which subject?")];
    /// let reply = service
    ///     .chat(Some("You are an exam invigilator."), &history, "Science")
    ///     .await?;
    /// println!("{}", reply);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn chat(
        &self,
        system_message: Option<&str>,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, BackendError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!(
            "历史 {} 条，用户消息长度: {} 字符",
            history.len(),
            user_message.len()
        );

        let messages = self.build_messages(system_message, history, user_message)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| BackendError::llm(&self.model_name, e))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            BackendError::llm(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BackendError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 构建消息列表：system → history → user
    fn build_messages(
        &self,
        system_message: Option<&str>,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, BackendError> {
        let llm_err = |e| BackendError::llm(&self.model_name, e);
        let mut messages = Vec::with_capacity(history.len() + 2);

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(llm_err)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        for message in history {
            let converted = match message.role {
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(message.content.as_str())
                        .build()
                        .map_err(llm_err)?,
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(message.content.as_str())
                        .build()
                        .map_err(llm_err)?,
                ),
            };
            messages.push(converted);
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(llm_err)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl TextGenerator for LlmService {
    async fn generate(
        &self,
        system_message: Option<&str>,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, BackendError> {
        self.chat(system_message, history, user_message).await
    }
}
