//! 打印版试卷（自包含 HTML）
//!
//! 与 PDF 使用各自的行分类规则：只区分分区标题、空行和普通行。

use regex::Regex;

use crate::error::RenderError;
use crate::models::StudentIdentity;

/// 试卷中没有写明时的默认值
pub const DEFAULT_MAX_MARKS: &str = "80";
pub const DEFAULT_TIME_ALLOWED: &str = "3 Hours";

/// 固定的考试说明
const INSTRUCTIONS: [&str; 5] = [
    "All questions are compulsory unless an internal choice is given.",
    "Read every question carefully before you begin writing.",
    "Marks for each question are indicated against it.",
    "Write neatly and number your answers exactly as in the question paper.",
    "Use of calculators and electronic devices is not permitted.",
];

const STYLE: &str = r#"body { font-family: "Times New Roman", serif; margin: 40px; color: #111; }
.paper-header { text-align: center; border-bottom: 2px solid #111; padding-bottom: 12px; }
.paper-header h1 { font-size: 22px; margin: 0 0 6px 0; }
.meta { display: flex; justify-content: space-between; font-weight: bold; margin-top: 8px; }
.student { margin: 16px 0; }
.student td { padding: 4px 12px 4px 0; }
.field { display: inline-block; min-width: 200px; border-bottom: 1px solid #111; }
.instructions { border: 1px solid #111; padding: 8px 16px; margin-bottom: 16px; }
.section-header { font-weight: bold; font-size: 16px; text-align: center; margin: 18px 0 8px 0; padding: 4px; background: #eee; }
.line { margin: 2px 0; line-height: 1.5; }
.spacer { height: 10px; }
@media print { body { margin: 15mm; } .section-header { background: none; border-bottom: 1px solid #111; } }"#;

/// 打印版中用到的考试信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintMetadata {
    pub subject: String,
    pub student: StudentIdentity,
}

/// 打印版试卷生成器
pub struct PrintDocumentComposer {
    max_marks: Regex,
    time_allowed: Regex,
    section: Regex,
    strong: Regex,
}

impl PrintDocumentComposer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            max_marks: Regex::new(r"(?i)max(?:imum)?\.?\s+marks\s*\**\s*[:\-]?\s*\**\s*(\d+)")?,
            time_allowed: Regex::new(r"(?i)time\s+allowed\s*\**\s*[:\-]?\s*\**\s*([^\n|*]+)")?,
            section: Regex::new(r"(?i)^\**\s*section\s+[a-z]\b")?,
            strong: Regex::new(r"\*\*(.+?)\*\*")?,
        })
    }

    /// 最高分，缺失时为 "80"
    pub fn max_marks(&self, paper: &str) -> String {
        self.max_marks
            .captures(paper)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_MAX_MARKS.to_string())
    }

    /// 考试时长，缺失时为 "3 Hours"
    pub fn time_allowed(&self, paper: &str) -> String {
        self.time_allowed
            .captures(paper)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TIME_ALLOWED.to_string())
    }

    /// 生成完整 HTML
    pub fn compose(&self, paper: &str, meta: &PrintMetadata) -> String {
        let subject = if meta.subject.trim().is_empty() {
            "Question Paper"
        } else {
            meta.subject.trim()
        };
        let subject = html_escape::encode_text(subject);
        let marks = html_escape::encode_text(&self.max_marks(paper)).into_owned();
        let time = html_escape::encode_text(&self.time_allowed(paper)).into_owned();

        let mut html = String::with_capacity(paper.len() * 2 + 4096);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{} Question Paper</title>\n", subject));
        html.push_str(&format!("<style>\n{}\n</style>\n</head>\n<body>\n", STYLE));

        html.push_str("<div class=\"paper-header\">\n");
        html.push_str(&format!("<h1>{} Question Paper</h1>\n", subject));
        html.push_str(&format!(
            "<div class=\"meta\"><span>Time Allowed: {}</span><span>Maximum Marks: {}</span></div>\n",
            time, marks
        ));
        html.push_str("</div>\n");

        html.push_str(&student_block(&meta.student));

        html.push_str("<div class=\"instructions\">\n<strong>General Instructions:</strong>\n<ol>\n");
        for item in INSTRUCTIONS {
            html.push_str(&format!("<li>{}</li>\n", item));
        }
        html.push_str("</ol>\n</div>\n");

        html.push_str("<div class=\"paper\">\n");
        for line in paper.lines() {
            html.push_str(&self.compose_line(line));
            html.push('\n');
        }
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    fn compose_line(&self, line: &str) -> String {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return "<div class=\"spacer\"></div>".to_string();
        }
        if self.section.is_match(trimmed) {
            let title = trimmed.replace("**", "");
            return format!(
                "<div class=\"section-header\">{}</div>",
                html_escape::encode_text(title.trim())
            );
        }
        format!("<p class=\"line\">{}</p>", self.inline_markup(trimmed))
    }

    /// 转义后把 `**text**` 换成 `<strong>`
    fn inline_markup(&self, text: &str) -> String {
        let escaped = html_escape::encode_text(text);
        self.strong
            .replace_all(&escaped, "<strong>$1</strong>")
            .into_owned()
    }
}

/// 学生信息栏，空字段留出下划线
fn student_block(student: &StudentIdentity) -> String {
    let field = |value: &str| {
        format!(
            "<span class=\"field\">{}</span>",
            html_escape::encode_text(value.trim())
        )
    };
    format!(
        "<table class=\"student\">\n\
         <tr><td>Name:</td><td>{}</td><td>Class:</td><td>{}</td></tr>\n\
         <tr><td>Board:</td><td>{}</td><td>Roll No:</td><td>{}</td></tr>\n\
         </table>\n",
        field(&student.name),
        field(&student.class),
        field(&student.board),
        field(""),
    )
}

/// 下载时的文件名，例如 `Social_Science_Question_Paper.html`
pub fn print_file_name(subject: &str) -> String {
    let stem: String = subject
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "Question_Paper.html".to_string()
    } else {
        format!("{}_Question_Paper.html", stem)
    }
}
