use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 一条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// 去掉上传标记后的副本（用于发送给协作服务）
    pub fn without_upload_markers(&self) -> Self {
        Self {
            role: self.role,
            content: strip_upload_markers(&self.content),
        }
    }
}

/// 上传文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// 教学大纲
    Syllabus,
    /// 答题卡
    Answer,
}

/// 所有上传标记共同的前缀
const UPLOAD_MARKER_PREFIX: &str = "📎 [";

impl UploadKind {
    /// 附加在用户消息后的固定标记
    pub fn marker(self) -> &'static str {
        match self {
            UploadKind::Syllabus => "📎 [Syllabus uploaded]",
            UploadKind::Answer => "📎 [Answer sheet uploaded]",
        }
    }
}

/// 删除消息中的上传标记行
pub fn strip_upload_markers(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with(UPLOAD_MARKER_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// 对话模式
///
/// 同时作为请求中的模式标签和本地存储键的前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Tutor,
    Practice,
    Revision,
    Oral,
    Exam,
}

impl ChatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatMode::Tutor => "tutor",
            ChatMode::Practice => "practice",
            ChatMode::Revision => "revision",
            ChatMode::Oral => "oral",
            ChatMode::Exam => "exam",
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_upload_markers() {
        let content = format!("here is my work\n{}", UploadKind::Answer.marker());
        assert_eq!(strip_upload_markers(&content), "here is my work");

        let only_marker = UploadKind::Syllabus.marker();
        assert_eq!(strip_upload_markers(only_marker), "");
    }

    #[test]
    fn test_plain_message_is_untouched() {
        let msg = ChatMessage::user("Science please\nthanks");
        assert_eq!(msg.without_upload_markers(), msg);
    }

    #[test]
    fn test_serde_shapes() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(serde_json::to_string(&ChatMode::Exam).unwrap(), "\"exam\"");
        assert_eq!(
            serde_json::to_string(&UploadKind::Syllabus).unwrap(),
            "\"syllabus\""
        );
    }
}
