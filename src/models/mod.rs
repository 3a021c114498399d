pub mod identity;
pub mod message;
pub mod subject;
pub mod wire;

pub use identity::{load_profile, StudentIdentity};
pub use message::{strip_upload_markers, ChatMessage, ChatMode, Role, UploadKind};
pub use subject::Subject;
pub use wire::{ExamReply, ExamRequest};
