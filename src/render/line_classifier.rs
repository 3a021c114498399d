//! 试卷行分类（PDF 用）
//!
//! 按固定顺序尝试：空行 → 分区标记 → 卷头字段 / 装饰线 / 表情标记 → 正文

use regex::Regex;

/// 源行类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Section,
    Header,
    Body,
}

impl LineKind {
    /// 分区和卷头用粗体
    pub fn is_bold(self) -> bool {
        matches!(self, LineKind::Section | LineKind::Header)
    }
}

/// 行首表情标记
const EMOJI_MARKERS: [&str; 8] = ["📝", "📋", "📚", "⏰", "🎯", "✅", "📌", "⭐"];

pub struct LineClassifier {
    section: Regex,
    header_patterns: Vec<Regex>,
}

impl LineClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let header_patterns = [
            // 卷头字段
            r"(?i)^(?:subject|class|board|time\s+allowed|maximum\s+marks|total\s+marks|name|roll\s+no)\s*\**\s*:",
            r"(?i)^general\s+instructions\b",
            // 全大写标题，例如 "CBSE SAMPLE QUESTION PAPER"
            r"^[A-Z0-9][A-Z0-9 &\-()]{5,}$",
            // Markdown 标题
            r"^#{1,6}\s",
            // 装饰线
            r"^[=\-_*~#]{3,}",
            r"^[━─═]+",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            section: Regex::new(r"(?i)^section\s+[a-z]\b")?,
            header_patterns,
        })
    }

    pub fn classify(&self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineKind::Blank;
        }

        let plain = trimmed.trim_start_matches('*').trim_start();
        if self.section.is_match(plain) {
            return LineKind::Section;
        }
        if EMOJI_MARKERS.iter().any(|m| plain.starts_with(m))
            || self.header_patterns.iter().any(|re| re.is_match(plain))
        {
            return LineKind::Header;
        }
        LineKind::Body
    }
}
