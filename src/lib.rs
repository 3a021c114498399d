//! # Mock Exam
//!
//! 终端模拟考试：与协作服务对话选科目、领取试卷、计时作答、提交评分，
//! 并把试卷导出为分页 PDF 或打印版 HTML。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 时钟、一秒一跳的考试计时器、有界本地历史
//!
//! ### ② 业务能力层（Services）
//! - `SignalExtractor` - 从回复中识别恢复 / 试卷就绪 / 结束信号
//! - `LlmService` - OpenAI 兼容的对话接口
//! - `ExamBackend` - 协作服务（HTTP 转发或直连 LLM）
//!
//! ### ③ 渲染层（Render）
//! - `PaginatedDocumentBuilder` - 折行、分页、页码的 PDF
//! - `PrintDocumentComposer` - 自包含的打印版 HTML
//!
//! ### ④ 流程层（Workflow）
//! - `ExamSessionController` - 考试状态机、单请求在途、过期回复丢弃
//!
//! ### ⑤ 编排层（Orchestration）
//! - 终端前端、文档服务、打印版交付

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod render;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::App;
pub use render::{PaginatedDocumentBuilder, PrintDocumentComposer};
pub use services::{ExamBackend, SignalExtractor};
pub use workflow::{ExamSessionController, SendOutcome, Transition};
