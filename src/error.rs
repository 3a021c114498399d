use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 协作服务（文本生成服务）错误
    #[error("协作服务错误: {0}")]
    Backend(#[from] BackendError),
    /// 本地存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 文档渲染错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
}

/// 协作服务错误
#[derive(Debug, Error)]
pub enum BackendError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回错误状态
    #[error("服务返回错误状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 返回内容无法解析
    #[error("返回内容解析失败: {0}")]
    MalformedReply(String),
    /// LLM 调用失败
    #[error("LLM 调用失败 (模型: {model}): {message}")]
    Llm { model: String, message: String },
    /// LLM 返回内容为空
    #[error("LLM 返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读取失败
    #[error("读取失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 编解码失败
    #[error("JSON 编解码失败 ({path}): {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 文档渲染错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 字符没有可用的字形
    #[error("无法测量字符 {ch:?} 的宽度")]
    UnsupportedGlyph { ch: char },
    /// 行中含有无法绘制的字符
    #[error("第 {line} 行包含无法绘制的字符 {ch:?}")]
    Undrawable { line: usize, ch: char },
    /// PDF 序列化失败
    #[error("PDF 序列化失败: {0}")]
    Pdf(String),
    /// 正则表达式编译失败
    #[error("正则表达式编译失败: {0}")]
    Regex(#[from] regex::Error),
    /// 写出文件失败
    #[error("写出文档失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Render(RenderError::Regex(err))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_default();
        BackendError::RequestFailed {
            endpoint,
            source: Box::new(err),
        }
    }
}

// ========== 便捷构造函数 ==========

impl BackendError {
    /// 创建 LLM 调用错误
    pub fn llm(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        BackendError::Llm {
            model: model.into(),
            message: message.to_string(),
        }
    }
}

impl StoreError {
    /// 创建读取失败错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建写入失败错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
