//! 考试计时器 - 基础设施层
//!
//! 持有唯一的后台 tick 任务，只暴露"开始 / 停止 / 读取已用时间"的能力。
//! 已用时间永远由 `now - start` 重新计算，tick 只负责推送给订阅者。

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::infrastructure::clock::Clock;

/// tick 间隔
const TICK: Duration = Duration::from_secs(1);

/// 考试计时器
///
/// 职责：
/// - 同一时间最多一个 tick 任务
/// - 重复 start / stop 都是空操作
/// - drop 时一定停止任务
pub struct ExamTimer {
    clock: Arc<dyn Clock>,
    elapsed_tx: Arc<watch::Sender<u64>>,
    handle: Option<JoinHandle<()>>,
    start_ms: Option<i64>,
    frozen: Option<u64>,
}

impl ExamTimer {
    pub fn new(clock: Arc<dyn Clock>, elapsed_tx: Arc<watch::Sender<u64>>) -> Self {
        Self {
            clock,
            elapsed_tx,
            handle: None,
            start_ms: None,
            frozen: None,
        }
    }

    /// 从给定的开始时间启动计时
    ///
    /// 已在运行时不做任何事并返回 `false`。
    /// 不在 tokio 运行时中时只记录开始时间，不推送 tick。
    pub fn start(&mut self, start_ms: i64) -> bool {
        if self.is_running() {
            debug!("计时器已在运行，忽略重复启动");
            return false;
        }

        self.start_ms = Some(start_ms);
        self.frozen = None;
        let clock = Arc::clone(&self.clock);
        let tx = Arc::clone(&self.elapsed_tx);
        tx.send_replace(elapsed_between(clock.now_millis(), start_ms));

        match Handle::try_current() {
            Ok(runtime) => {
                self.handle = Some(runtime.spawn(async move {
                    let mut interval = tokio::time::interval(TICK);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        tx.send_replace(elapsed_between(clock.now_millis(), start_ms));
                    }
                }));
            }
            Err(_) => warn!("⚠️ 不在 tokio 运行时中，计时器不推送 tick"),
        }
        debug!("⏱️ 计时器启动，开始时间: {}", start_ms);
        true
    }

    /// 停止计时并冻结已用时间
    ///
    /// 未运行时不做任何事并返回 `false`
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        let elapsed = self.compute();
        self.frozen = Some(elapsed);
        debug!("⏹️ 计时器停止，已用 {} 秒", elapsed);
        true
    }

    pub fn is_running(&self) -> bool {
        self.start_ms.is_some() && self.frozen.is_none()
    }

    pub fn start_ms(&self) -> Option<i64> {
        self.start_ms
    }

    /// 当前已用秒数；停止后返回冻结值
    pub fn elapsed_seconds(&self) -> u64 {
        match self.frozen {
            Some(frozen) => frozen,
            None => self.compute(),
        }
    }

    fn compute(&self) -> u64 {
        self.start_ms
            .map(|start| elapsed_between(self.clock.now_millis(), start))
            .unwrap_or(0)
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// 开始时间在未来时按 0 计算
pub fn elapsed_between(now_ms: i64, start_ms: i64) -> u64 {
    (now_ms.saturating_sub(start_ms) / 1000).max(0) as u64
}
