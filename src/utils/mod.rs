pub mod logging;
pub mod time_format;

pub use logging::truncate_text;
pub use time_format::{elapsed_label, time_taken_label};
