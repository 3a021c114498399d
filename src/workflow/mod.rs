pub mod exam_session;
pub mod exam_state;

pub use exam_session::{ExamSessionController, SendOutcome, SessionSnapshot, Transition};
pub use exam_state::{ExamOutcome, ExamPhase};
