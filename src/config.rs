use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
///
/// 优先级：环境变量 > 配置文件 > 默认值
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 外部协作服务地址；设置后通过 HTTP 转发，而不是直接调用 LLM
    pub backend_url: Option<String>,
    /// 本地历史记录目录
    pub history_dir: String,
    /// 文档输出目录（也是强制下载的兜底目录）
    pub output_dir: String,
    /// 学生档案 TOML 文件
    pub profile_path: String,
    /// 每次请求附带的历史消息条数
    pub history_window: usize,
    /// 文档服务监听地址
    pub server_addr: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            backend_url: None,
            history_dir: ".mock_exam".to_string(),
            output_dir: "output".to_string(),
            profile_path: "profile.toml".to_string(),
            history_window: 10,
            server_addr: "127.0.0.1:3000".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 只从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再叠加环境变量
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: display.clone(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: display,
                source,
            })?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let env = |name: &str| std::env::var(name).ok();
        Self {
            llm_api_key: env("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            backend_url: env("EXAM_BACKEND_URL").or(self.backend_url),
            history_dir: env("HISTORY_DIR").unwrap_or(self.history_dir),
            output_dir: env("OUTPUT_DIR").unwrap_or(self.output_dir),
            profile_path: env("PROFILE_PATH").unwrap_or(self.profile_path),
            history_window: env("HISTORY_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.history_window),
            server_addr: env("SERVER_ADDR").unwrap_or(self.server_addr),
            verbose_logging: env("VERBOSE_LOGGING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.verbose_logging),
        }
    }
}
