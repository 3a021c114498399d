//! 文档渲染层
//!
//! 同一份试卷原文生成两种产物：分页 PDF 和打印版 HTML。

pub mod diagnostics;
pub mod glyph_metrics;
pub mod line_classifier;
pub mod pdf_builder;
pub mod print_composer;
pub mod text_wrapper;

pub use diagnostics::RenderIssue;
pub use glyph_metrics::{GlyphMetrics, StandardFont};
pub use line_classifier::{LineClassifier, LineKind};
pub use pdf_builder::{PageGeometry, PaginatedDocumentBuilder, PdfOutput};
pub use print_composer::{print_file_name, PrintDocumentComposer, PrintMetadata};
pub use text_wrapper::TextWrapper;
