//! 本地有界历史存储 - 基础设施层
//!
//! 每个对话模式一份消息历史（最多保留最后 10 条）和一个会话标识槽位。
//! 只有会话控制器会写入。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::StoreError;
use crate::models::{ChatMessage, ChatMode};

/// 每个模式最多持久化的消息条数
pub const MAX_STORED_MESSAGES: usize = 10;

/// 有界历史存储
pub trait HistoryStore: Send + Sync {
    fn load(&self, mode: ChatMode) -> Result<Vec<ChatMessage>, StoreError>;

    /// 保存消息，只保留最后 `MAX_STORED_MESSAGES` 条
    fn save(&self, mode: ChatMode, messages: &[ChatMessage]) -> Result<(), StoreError>;

    fn clear(&self, mode: ChatMode) -> Result<(), StoreError>;

    fn load_session_id(&self, mode: ChatMode) -> Result<Option<String>, StoreError>;

    fn save_session_id(&self, mode: ChatMode, session_id: &str) -> Result<(), StoreError>;

    fn clear_session_id(&self, mode: ChatMode) -> Result<(), StoreError>;
}

/// 取最后 `MAX_STORED_MESSAGES` 条
pub fn bounded_tail(messages: &[ChatMessage]) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(MAX_STORED_MESSAGES);
    &messages[start..]
}

// ========== 内存实现 ==========

/// 进程内存储
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    messages: Mutex<HashMap<ChatMode, Vec<ChatMessage>>>,
    sessions: Mutex<HashMap<ChatMode, String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, mode: ChatMode) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        Ok(messages.get(&mode).cloned().unwrap_or_default())
    }

    fn save(&self, mode: ChatMode, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let mut stored = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        stored.insert(mode, bounded_tail(messages).to_vec());
        Ok(())
    }

    fn clear(&self, mode: ChatMode) -> Result<(), StoreError> {
        let mut stored = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        stored.remove(&mode);
        Ok(())
    }

    fn load_session_id(&self, mode: ChatMode) -> Result<Option<String>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(&mode).cloned())
    }

    fn save_session_id(&self, mode: ChatMode, session_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(mode, session_id.to_string());
        Ok(())
    }

    fn clear_session_id(&self, mode: ChatMode) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(&mode);
        Ok(())
    }
}

// ========== 文件实现 ==========

/// JSON 文件存储
///
/// 目录下每个模式两个文件：`<mode>_messages.json` 和 `<mode>_session_id`
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    dir: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn messages_path(&self, mode: ChatMode) -> PathBuf {
        self.dir.join(format!("{}_messages.json", mode.as_str()))
    }

    fn session_path(&self, mode: ChatMode) -> PathBuf {
        self.dir.join(format!("{}_session_id", mode.as_str()))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::write_failed(self.dir.display().to_string(), e))
    }
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::write_failed(path.display().to_string(), e)),
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn load(&self, mode: ChatMode) -> Result<Vec<ChatMessage>, StoreError> {
        let path = self.messages_path(mode);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::read_failed(path.display().to_string(), e)),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    fn save(&self, mode: ChatMode, messages: &[ChatMessage]) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let path = self.messages_path(mode);
        let tail = bounded_tail(messages);
        let json = serde_json::to_string_pretty(tail).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(&path, json)
            .map_err(|e| StoreError::write_failed(path.display().to_string(), e))?;
        debug!("已保存 {} 条 {} 消息", tail.len(), mode);
        Ok(())
    }

    fn clear(&self, mode: ChatMode) -> Result<(), StoreError> {
        remove_if_exists(&self.messages_path(mode))
    }

    fn load_session_id(&self, mode: ChatMode) -> Result<Option<String>, StoreError> {
        let path = self.session_path(mode);
        match std::fs::read_to_string(&path) {
            Ok(id) if !id.trim().is_empty() => Ok(Some(id.trim().to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::read_failed(path.display().to_string(), e)),
        }
    }

    fn save_session_id(&self, mode: ChatMode, session_id: &str) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let path = self.session_path(mode);
        std::fs::write(&path, session_id)
            .map_err(|e| StoreError::write_failed(path.display().to_string(), e))
    }

    fn clear_session_id(&self, mode: ChatMode) -> Result<(), StoreError> {
        remove_if_exists(&self.session_path(mode))
    }
}
