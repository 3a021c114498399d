//! 考试状态
//!
//! 显式的状态枚举：计时器只存在于 `Active` 中，
//! 因此"已结束但计时器仍在运行"无法表示。

use std::fmt;

use crate::infrastructure::ExamTimer;
use crate::utils::time_taken_label;

/// 进行中的考试，持有唯一的计时器
pub struct ActiveExam {
    pub(crate) timer: ExamTimer,
    pub paper: String,
    pub subject: Option<String>,
    /// 是否由恢复信号进入
    pub restored: bool,
}

impl ActiveExam {
    pub fn start_ms(&self) -> Option<i64> {
        self.timer.start_ms()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_seconds()
    }

    /// 停止计时并生成结果；计时器随 `self` 一起释放
    pub fn finish(
        mut self,
        result: ScoreFields,
        collaborator_time_taken: Option<String>,
    ) -> ExamOutcome {
        self.timer.stop();
        let elapsed_seconds = self.timer.elapsed_seconds();
        ExamOutcome {
            paper: Some(self.paper),
            subject: self.subject,
            start_ms: self.timer.start_ms(),
            elapsed_seconds,
            marks_obtained: result.marks_obtained,
            total_marks: result.total_marks,
            percentage: result.percentage,
            time_taken: collaborator_time_taken
                .unwrap_or_else(|| time_taken_label(elapsed_seconds)),
        }
    }
}

impl fmt::Debug for ActiveExam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveExam")
            .field("start_ms", &self.start_ms())
            .field("subject", &self.subject)
            .field("restored", &self.restored)
            .field("paper_len", &self.paper.len())
            .finish()
    }
}

/// 结束信号中的分数字段
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreFields {
    pub marks_obtained: Option<f64>,
    pub total_marks: Option<f64>,
    pub percentage: Option<f64>,
}

/// 考试结果，写入后不再改变
#[derive(Debug, Clone, PartialEq)]
pub struct ExamOutcome {
    pub paper: Option<String>,
    pub subject: Option<String>,
    pub start_ms: Option<i64>,
    pub elapsed_seconds: u64,
    pub marks_obtained: Option<f64>,
    pub total_marks: Option<f64>,
    pub percentage: Option<f64>,
    pub time_taken: String,
}

/// 会话状态
#[derive(Debug, Default)]
pub enum ExamState {
    /// 刚创建，只有问候语
    #[default]
    Greeting,
    /// 已开始对话，科目未确认
    AwaitingSubject,
    /// 科目已确认，等待试卷
    PaperPending,
    /// 正在恢复（瞬时）
    Resuming,
    Active(ActiveExam),
    Ended(ExamOutcome),
}

impl ExamState {
    pub fn phase(&self) -> ExamPhase {
        match self {
            ExamState::Greeting => ExamPhase::Greeting,
            ExamState::AwaitingSubject => ExamPhase::AwaitingSubject,
            ExamState::PaperPending => ExamPhase::PaperPending,
            ExamState::Resuming => ExamPhase::Resuming,
            ExamState::Active(_) => ExamPhase::Active,
            ExamState::Ended(_) => ExamPhase::Ended,
        }
    }

    /// 还没有开始计时
    pub fn is_before_start(&self) -> bool {
        matches!(
            self,
            ExamState::Greeting | ExamState::AwaitingSubject | ExamState::PaperPending
        )
    }
}

/// 状态标签（不带数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    Greeting,
    AwaitingSubject,
    PaperPending,
    Resuming,
    Active,
    Ended,
}

impl fmt::Display for ExamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExamPhase::Greeting => "greeting",
            ExamPhase::AwaitingSubject => "awaiting subject",
            ExamPhase::PaperPending => "paper pending",
            ExamPhase::Resuming => "resuming",
            ExamPhase::Active => "active",
            ExamPhase::Ended => "ended",
        };
        f.write_str(label)
    }
}
