//! 渲染诊断
//!
//! 渲染器不会因为个别行失败而中断，问题记录在这里随文档一起返回

use std::fmt;

/// 一条渲染问题（行号从 1 开始，指源文本中的行）
#[derive(Debug, Clone, PartialEq)]
pub enum RenderIssue {
    /// 字宽无法测量，折行使用了估算值
    EstimatedWidth { line: usize },
    /// 该行无法绘制，已跳过
    SkippedLine { line: usize, reason: String },
}

impl RenderIssue {
    pub fn line(&self) -> usize {
        match self {
            RenderIssue::EstimatedWidth { line } | RenderIssue::SkippedLine { line, .. } => *line,
        }
    }
}

impl fmt::Display for RenderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderIssue::EstimatedWidth { line } => write!(f, "第 {} 行使用了估算字宽", line),
            RenderIssue::SkippedLine { line, reason } => {
                write!(f, "第 {} 行已跳过: {}", line, reason)
            }
        }
    }
}
