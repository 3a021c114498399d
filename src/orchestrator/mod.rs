//! 编排层（Orchestration Layer）
//!
//! 把下层能力接到进程边界上，本身不做考试判断。
//!
//! - `app`：交互式终端，驱动 `workflow::ExamSessionController`
//! - `server`：文档 HTTP 服务（`POST /api/generate-pdf`）
//! - `delivery`：打印版交付（系统查看器 / 强制下载）
//!
//! ```text
//! app / server
//!     ↓
//! workflow::ExamSessionController
//!     ↓
//! services (协作服务 / 信号提取) + render (PDF / 打印版)
//!     ↓
//! infrastructure (计时器 / 本地存储 / 时钟)
//! ```

pub mod app;
pub mod delivery;
pub mod server;

pub use app::App;
pub use delivery::{deliver_print_document, Delivery, PrintDelivery, SystemViewer, Viewer};
pub use server::{create_router, serve};
