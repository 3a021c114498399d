pub mod exam_backend;
pub mod llm_backend;
pub mod llm_service;
pub mod signal_extractor;

pub use exam_backend::{ExamBackend, HttpExamBackend};
pub use llm_backend::LlmExamBackend;
pub use llm_service::{LlmService, TextGenerator};
pub use signal_extractor::{Score, Signal, SignalExtractor, START_TRIGGER, SUBMIT_TRIGGER};
