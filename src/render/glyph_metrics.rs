//! 标准字体字宽
//!
//! PDF 只使用两种 Base-14 字体（Helvetica / Helvetica-Bold），
//! 字宽取自 Adobe AFM，单位为 1/1000 em，只覆盖可打印 ASCII。

use phf::phf_map;

use crate::error::RenderError;

/// 测量一段文本在指定字号下的宽度（单位：pt）
pub trait GlyphMetrics {
    fn text_width(&self, text: &str, size: f32) -> Result<f32, RenderError>;
}

/// PDF 中使用的字体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// PDF 中的 BaseFont 名称
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// 页面资源字典中的字体名
    pub fn resource_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "F1",
            StandardFont::HelveticaBold => "F2",
        }
    }

    pub fn for_weight(bold: bool) -> Self {
        if bold {
            StandardFont::HelveticaBold
        } else {
            StandardFont::Helvetica
        }
    }

    /// 单个字符的字宽（1/1000 em）
    pub fn glyph_width(self, ch: char) -> Option<u16> {
        let table = match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        table.get(&ch).copied()
    }

    /// 字符是否可以用这套字形绘制
    pub fn can_draw(self, ch: char) -> bool {
        self.glyph_width(ch).is_some()
    }
}

impl GlyphMetrics for StandardFont {
    fn text_width(&self, text: &str, size: f32) -> Result<f32, RenderError> {
        let mut units: u32 = 0;
        for ch in text.chars() {
            let width = self
                .glyph_width(ch)
                .ok_or(RenderError::UnsupportedGlyph { ch })?;
            units += u32::from(width);
        }
        Ok(units as f32 * size / 1000.0)
    }
}

static HELVETICA_WIDTHS: phf::Map<char, u16> = phf_map! {
    ' ' => 278, '!' => 278, '"' => 355, '#' => 556, '$' => 556, '%' => 889,
    '&' => 667, '\'' => 191, '(' => 333, ')' => 333, '*' => 389, '+' => 584,
    ',' => 278, '-' => 333, '.' => 278, '/' => 278,
    '0' => 556, '1' => 556, '2' => 556, '3' => 556, '4' => 556,
    '5' => 556, '6' => 556, '7' => 556, '8' => 556, '9' => 556,
    ':' => 278, ';' => 278, '<' => 584, '=' => 584, '>' => 584, '?' => 556,
    '@' => 1015,
    'A' => 667, 'B' => 667, 'C' => 722, 'D' => 722, 'E' => 667, 'F' => 611,
    'G' => 778, 'H' => 722, 'I' => 278, 'J' => 500, 'K' => 667, 'L' => 556,
    'M' => 833, 'N' => 722, 'O' => 778, 'P' => 667, 'Q' => 778, 'R' => 722,
    'S' => 667, 'T' => 611, 'U' => 722, 'V' => 667, 'W' => 944, 'X' => 667,
    'Y' => 667, 'Z' => 611,
    '[' => 278, '\\' => 278, ']' => 278, '^' => 469, '_' => 556, '`' => 333,
    'a' => 556, 'b' => 556, 'c' => 500, 'd' => 556, 'e' => 556, 'f' => 278,
    'g' => 556, 'h' => 556, 'i' => 222, 'j' => 222, 'k' => 500, 'l' => 222,
    'm' => 833, 'n' => 556, 'o' => 556, 'p' => 556, 'q' => 556, 'r' => 333,
    's' => 500, 't' => 278, 'u' => 556, 'v' => 500, 'w' => 722, 'x' => 500,
    'y' => 500, 'z' => 500,
    '{' => 334, '|' => 260, '}' => 334, '~' => 584,
};

static HELVETICA_BOLD_WIDTHS: phf::Map<char, u16> = phf_map! {
    ' ' => 278, '!' => 333, '"' => 474, '#' => 556, '$' => 556, '%' => 889,
    '&' => 722, '\'' => 238, '(' => 333, ')' => 333, '*' => 389, '+' => 584,
    ',' => 278, '-' => 333, '.' => 278, '/' => 278,
    '0' => 556, '1' => 556, '2' => 556, '3' => 556, '4' => 556,
    '5' => 556, '6' => 556, '7' => 556, '8' => 556, '9' => 556,
    ':' => 333, ';' => 333, '<' => 584, '=' => 584, '>' => 584, '?' => 611,
    '@' => 975,
    'A' => 722, 'B' => 722, 'C' => 722, 'D' => 722, 'E' => 667, 'F' => 611,
    'G' => 778, 'H' => 722, 'I' => 278, 'J' => 556, 'K' => 722, 'L' => 611,
    'M' => 833, 'N' => 722, 'O' => 778, 'P' => 667, 'Q' => 778, 'R' => 722,
    'S' => 667, 'T' => 611, 'U' => 722, 'V' => 667, 'W' => 944, 'X' => 667,
    'Y' => 667, 'Z' => 611,
    '[' => 333, '\\' => 278, ']' => 333, '^' => 584, '_' => 556, '`' => 333,
    'a' => 556, 'b' => 611, 'c' => 556, 'd' => 611, 'e' => 556, 'f' => 333,
    'g' => 611, 'h' => 611, 'i' => 278, 'j' => 278, 'k' => 556, 'l' => 278,
    'm' => 889, 'n' => 611, 'o' => 611, 'p' => 611, 'q' => 611, 'r' => 389,
    's' => 556, 't' => 333, 'u' => 611, 'v' => 556, 'w' => 778, 'x' => 556,
    'y' => 556, 'z' => 500,
    '{' => 389, '|' => 280, '}' => 389, '~' => 584,
};
