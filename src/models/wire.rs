//! 与文本生成协作服务交换的数据结构

use serde::{Deserialize, Serialize};

use crate::models::identity::StudentIdentity;
use crate::models::message::{ChatMessage, ChatMode, UploadKind};

/// 发往协作服务的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRequest {
    pub mode: ChatMode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_kind: Option<UploadKind>,
    /// 截断后的历史（已去掉上传标记）
    pub history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_subject: Option<String>,
    pub student_name: String,
    pub student_class: String,
    pub board: String,
    pub session_id: String,
    /// 单调递增的请求序号
    #[serde(default)]
    pub sequence: u64,
}

impl ExamRequest {
    /// 还原请求中的身份信息
    pub fn identity(&self) -> StudentIdentity {
        StudentIdentity::new(&self.student_name, &self.student_class, &self.board)
    }
}

/// 协作服务的返回
///
/// 四种形态靠字段是否存在区分，优先级见 `Signal::classify`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_exam: Option<bool>,
    /// 考试开始时间（毫秒时间戳）
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 恢复考试时附带的试卷
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_paper: Option<String>,
    /// 新生成的试卷
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_ended: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub marks_obtained: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_marks: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<String>,
}

impl ExamReply {
    /// 普通文本回复
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Default::default()
        }
    }
}

// 数字字段既可能是 JSON 数字，也可能是数字字符串；其他形态视为缺失
fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a numeric string")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.is_finite().then_some(value))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        }

        fn visit_bool<E>(self, _value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(NumberVisitor)
        }
    }

    deserializer.deserialize_any(NumberVisitor)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_number(deserializer)?.map(|ms| ms as i64))
}
