//! 基础设施层：持有稀缺资源（计时任务、本地存储、时钟），只暴露能力

pub mod clock;
pub mod history_store;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use history_store::{
    HistoryStore, JsonFileHistoryStore, MemoryHistoryStore, MAX_STORED_MESSAGES,
};
pub use timer::ExamTimer;
