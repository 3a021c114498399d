use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 学生身份信息（只读，来自外部档案）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentIdentity {
    pub name: String,
    pub class: String,
    pub board: String,
}

impl StudentIdentity {
    pub fn new(
        name: impl Into<String>,
        class: impl Into<String>,
        board: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            board: board.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.class.is_empty() && self.board.is_empty()
    }

    /// 用于识别"同一个学生"的键
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name.trim().to_lowercase(),
            self.class.trim().to_lowercase(),
            self.board.trim().to_lowercase()
        )
    }
}

/// 从 TOML 档案加载学生身份
///
/// 尽力而为：文件缺失或格式错误时返回空身份，不会失败
pub fn load_profile(path: &Path) -> StudentIdentity {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("⚠️ 无法读取学生档案 {}: {}，使用空身份", path.display(), e);
            return StudentIdentity::default();
        }
    };

    match toml::from_str::<StudentIdentity>(&content) {
        Ok(identity) => {
            debug!("已加载学生档案: {:?}", identity);
            identity
        }
        Err(e) => {
            warn!("⚠️ 学生档案格式错误 {}: {}，使用空身份", path.display(), e);
            StudentIdentity::default()
        }
    }
}
