//! 信号提取 - 业务能力层
//!
//! 从协作服务的自由文本回复中恢复结构化信号：确认的科目、试卷科目、分数。
//! 纯函数，无副作用；多个模式按顺序尝试，第一个命中即返回。

use regex::Regex;

use crate::models::{ExamReply, Subject};

/// 开始计时的触发短语（问候语中原样展示）
pub const START_TRIGGER: &str = "START EXAM";

/// 交卷短语
pub const SUBMIT_TRIGGER: &str = "SUBMIT EXAM";

/// 协作服务回复对应的信号
///
/// 优先级：恢复 > 试卷就绪 > 考试结束 > 普通回复
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// 恢复进行中的考试
    Resume {
        start_ms: i64,
        paper: Option<String>,
        subject: Option<String>,
        reply: Option<String>,
    },
    /// 新试卷已生成，开始计时
    PaperReady {
        start_ms: i64,
        paper: Option<String>,
        subject: Option<String>,
        reply: Option<String>,
    },
    /// 考试结束
    Ended {
        reply: String,
        marks_obtained: Option<f64>,
        total_marks: Option<f64>,
        percentage: Option<f64>,
        time_taken: Option<String>,
    },
    /// 普通回复
    Plain { reply: String },
}

impl Signal {
    /// 按字段是否存在区分回复形态
    pub fn classify(reply: ExamReply) -> Self {
        let ExamReply {
            reply: text,
            resume_exam,
            start_time,
            subject,
            question_paper,
            paper,
            exam_ended,
            marks_obtained,
            total_marks,
            percentage,
            time_taken,
        } = reply;
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        match (resume_exam, start_time, exam_ended) {
            (Some(true), Some(start_ms), _) => Signal::Resume {
                start_ms,
                paper: non_empty(question_paper).or(non_empty(paper)),
                subject: non_empty(subject),
                reply: non_empty(text),
            },
            (_, Some(start_ms), _) => Signal::PaperReady {
                start_ms,
                paper: non_empty(paper).or(non_empty(question_paper)),
                subject: non_empty(subject),
                reply: non_empty(text),
            },
            (_, None, Some(true)) => Signal::Ended {
                reply: text.unwrap_or_default(),
                marks_obtained,
                total_marks,
                percentage,
                time_taken: non_empty(time_taken),
            },
            _ => Signal::Plain {
                reply: text.unwrap_or_default(),
            },
        }
    }
}

/// 从文本中解析出的分数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub obtained: f64,
    pub total: Option<f64>,
    pub percentage: Option<f64>,
}

/// 信号提取器
///
/// 构造时编译所有正则，之后只读
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    subject_patterns: Vec<Regex>,
    paper_subject: Regex,
    total_marks: Regex,
    marks_obtained: Regex,
    percentage: Regex,
    paper_markers: Vec<Regex>,
    start_trigger: Regex,
    submit_trigger: Regex,
}

impl SignalExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        // 科目名最多取三个单词，后面的内容交给 Subject::find 归一化
        const NAME: &str = r"\**\s*([A-Za-z]+(?:[ \t]+[A-Za-z]+){0,2})";
        let subject_patterns = [
            r"(?i)subject\s+detected\s*[:\-]?\s*",
            r"(?i)question\s+paper\s+for\s*[:\-]?\s*",
            r"(?i)subject\s+is\s+(?:now\s+)?set\s+to\s*[:\-]?\s*",
            r"(?i)selected\s+subject\s*[:\-]\s*",
        ]
        .iter()
        .map(|prefix| Regex::new(&format!("{prefix}{NAME}")))
        .collect::<Result<Vec<_>, _>>()?;

        let paper_markers = [
            r"(?im)^\s*\**\s*SECTION\s+[A-E]\b",
            r"(?i)maximum\s+marks",
            r"(?i)time\s+allowed",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            subject_patterns,
            paper_subject: Regex::new(r"(?im)^[ \t]*\**[ \t]*subject[ \t]*\**[ \t]*:[ \t]*\**[ \t]*([^\n*]+)")?,
            total_marks: Regex::new(r"(?i)total\s+marks\s*[:\-]?\s*\**\s*(\d+(?:\.\d+)?)")?,
            marks_obtained: Regex::new(
                r"(?i)marks\s+obtained\s*[:\-]?\s*\**\s*(\d+(?:\.\d+)?)(?:\s*(?:/|out\s+of)\s*(\d+(?:\.\d+)?))?",
            )?,
            percentage: Regex::new(r"(?i)percentage\s*[:\-]?\s*\**\s*(\d+(?:\.\d+)?)")?,
            paper_markers,
            start_trigger: trigger_pattern(START_TRIGGER)?,
            submit_trigger: trigger_pattern(SUBMIT_TRIGGER)?,
        })
    }

    /// 从普通回复中识别"已确认的科目"
    pub fn confirmed_subject(&self, text: &str) -> Option<String> {
        self.subject_patterns.iter().find_map(|re| {
            let raw = re.captures(text)?.get(1)?.as_str().trim();
            if raw.is_empty() {
                return None;
            }
            Some(
                Subject::find(raw)
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| raw.to_string()),
            )
        })
    }

    /// 从试卷中读取 `Subject: <value>` 行
    pub fn paper_subject(&self, paper: &str) -> Option<String> {
        let value = self.paper_subject.captures(paper)?.get(1)?.as_str();
        // 同一行可能还有 "| Class: 10" 之类的字段
        let value = value.split('|').next().unwrap_or_default();
        let value = value.trim().trim_end_matches('.').trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    /// 识别 "total marks: N"
    pub fn total_marks(&self, text: &str) -> Option<f64> {
        let caps = self.total_marks.captures(text)?;
        caps.get(1)?.as_str().parse().ok()
    }

    /// 识别评分结果，例如 "Marks Obtained: 62/80"
    pub fn score(&self, text: &str) -> Option<Score> {
        let caps = self.marks_obtained.captures(text)?;
        let obtained: f64 = caps.get(1)?.as_str().parse().ok()?;
        let total = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .or_else(|| self.total_marks(text));
        let percentage = self
            .percentage
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .or_else(|| {
                total
                    .filter(|t| *t > 0.0)
                    .map(|t| (obtained / t * 100.0).round())
            });
        Some(Score {
            obtained,
            total,
            percentage,
        })
    }

    /// 是否要求开始考试
    pub fn requests_start(&self, text: &str) -> bool {
        self.start_trigger.is_match(text)
    }

    /// 是否要求交卷
    pub fn requests_submit(&self, text: &str) -> bool {
        self.submit_trigger.is_match(text)
    }

    /// 文本是否像一份完整试卷
    pub fn looks_like_paper(&self, text: &str) -> bool {
        let mut markers = self.paper_markers.iter();
        // 必须有分区标题，并至少有一个卷头字段
        markers.next().is_some_and(|section| section.is_match(text))
            && markers.any(|re| re.is_match(text))
    }
}

/// 触发短语按整词匹配，词间允许任意空白，忽略大小写
fn trigger_pattern(trigger: &str) -> Result<Regex, regex::Error> {
    let words = trigger
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&format!(r"(?i)\b{}\b", words))
}
