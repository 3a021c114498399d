//! 时间显示格式

/// 计时器显示：`MM:SS`，超过一小时为 `H:MM:SS`
pub fn elapsed_label(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// 用时描述：`X min Y sec`，超过一小时为 `H hr M min`
pub fn time_taken_label(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{} hr {} min", hours, minutes)
    } else {
        format!("{} min {} sec", minutes, seconds % 60)
    }
}
