//! 按页宽折行

use tracing::debug;

use crate::render::glyph_metrics::GlyphMetrics;

/// 无法测量时的估算系数：字符数 × 字号 × 系数
pub const FALLBACK_WIDTH_FACTOR: f32 = 0.5;

/// 折行结果
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapped {
    /// 至少一行
    pub lines: Vec<String>,
    /// 是否有宽度是估算出来的
    pub estimated: bool,
}

/// 贪心折行器
///
/// 单词之间按空格切分；单个超宽单词独占一行，不会在词中断开。
#[derive(Debug, Clone, Copy)]
pub struct TextWrapper {
    pub font_size: f32,
    pub max_width: f32,
}

impl TextWrapper {
    pub fn new(font_size: f32, max_width: f32) -> Self {
        Self {
            font_size,
            max_width,
        }
    }

    /// 折行，只返回行
    pub fn wrap(&self, line: &str, metrics: &dyn GlyphMetrics) -> Vec<String> {
        self.wrap_reporting(line, metrics).lines
    }

    /// 折行，同时报告是否用了估算宽度
    pub fn wrap_reporting(&self, line: &str, metrics: &dyn GlyphMetrics) -> Wrapped {
        let normalized = normalize(line);
        let mut estimated = false;
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in normalized.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            let width = self.measure(&candidate, metrics, &mut estimated);
            if width > self.max_width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                current = candidate;
            }
        }

        // 空行也占一行
        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }

        Wrapped { lines, estimated }
    }

    /// 测量宽度；失败时使用确定性的估算值
    pub fn measure(&self, text: &str, metrics: &dyn GlyphMetrics, estimated: &mut bool) -> f32 {
        match metrics.text_width(text, self.font_size) {
            Ok(width) => width,
            Err(e) => {
                debug!("字宽测量失败，使用估算值: {}", e);
                *estimated = true;
                estimate_width(text, self.font_size)
            }
        }
    }
}

/// 字符数 × 字号 × 固定系数
pub fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * FALLBACK_WIDTH_FACTOR
}

/// 单字节字形范围以外的字符替换为空格；制表符也按空格处理
fn normalize(line: &str) -> String {
    line.chars()
        .map(|c| if c == '\t' || (c as u32) > 0x7f { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::glyph_metrics::StandardFont;

    const FONT: StandardFont = StandardFont::Helvetica;

    fn width(text: &str, size: f32) -> f32 {
        FONT.text_width(text, size).unwrap()
    }

    #[test]
    fn test_empty_line_yields_one_empty_line() {
        let wrapper = TextWrapper::new(11.0, 100.0);
        assert_eq!(wrapper.wrap("", &FONT), vec![String::new()]);
        assert_eq!(wrapper.wrap("   ", &FONT), vec![String::new()]);
    }

    #[test]
    fn test_lines_fit_max_width() {
        let wrapper = TextWrapper::new(11.0, 120.0);
        let text = "Q1. Explain the process of photosynthesis and name the gas released during it.";
        let lines = wrapper.wrap(text, &FONT);

        assert!(lines.len() >= 2);
        for line in &lines {
            assert!(width(line, 11.0) <= 120.0, "too wide: {line:?}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_long_word_is_not_split() {
        let wrapper = TextWrapper::new(11.0, 40.0);
        let lines = wrapper.wrap("a supercalifragilisticexpialidocious b", &FONT);
        assert_eq!(
            lines,
            vec!["a", "supercalifragilisticexpialidocious", "b"]
        );
    }

    #[test]
    fn test_non_ascii_becomes_space() {
        let wrapper = TextWrapper::new(11.0, 500.0);
        let wrapped = wrapper.wrap_reporting("📝 SECTION A — Physics", &FONT);
        assert_eq!(wrapped.lines, vec!["SECTION A Physics"]);
        assert!(!wrapped.estimated);
    }

    #[test]
    fn test_control_characters_fall_back_to_estimate() {
        let wrapper = TextWrapper::new(10.0, 1000.0);
        let wrapped = wrapper.wrap_reporting("bell\u{7} here", &FONT);
        assert!(wrapped.estimated);
        assert_eq!(wrapped.lines, vec!["bell\u{7} here"]);
        assert_eq!(estimate_width("abcd", 10.0), 20.0);
    }
}
