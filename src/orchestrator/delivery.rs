//! 打印版交付
//!
//! 先写临时文件并交给系统查看器打开；打不开时强制"下载"到下载目录。

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::error::RenderError;
use crate::render::print_file_name;

/// 交付结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// 已在查看器中打开
    Opened(PathBuf),
    /// 查看器不可用，已保存到下载目录
    Downloaded(PathBuf),
}

/// 打开文件的查看器
pub trait Viewer: Send + Sync {
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// 系统默认程序
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemViewer;

impl Viewer for SystemViewer {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        let status = Command::new("open").arg(path).status()?;

        #[cfg(target_os = "windows")]
        let status = Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .status()?;

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let status = Command::new("xdg-open").arg(path).status()?;

        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("查看器退出状态: {}", status)))
        }
    }
}

/// 打印版交付器
pub struct PrintDelivery {
    viewer: Box<dyn Viewer>,
    download_dir: PathBuf,
    temp_dir: PathBuf,
}

impl PrintDelivery {
    pub fn new(viewer: Box<dyn Viewer>, download_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            viewer,
            download_dir,
            temp_dir,
        }
    }

    /// 系统查看器；下载目录不可用时退回到 `output_dir`
    pub fn system(output_dir: &Path) -> Self {
        let download_dir = dirs::download_dir().unwrap_or_else(|| output_dir.to_path_buf());
        Self::new(Box::new(SystemViewer), download_dir, std::env::temp_dir())
    }

    /// 交付一份打印版试卷
    ///
    /// 只有强制下载也写不进去时才返回错误
    pub fn deliver(&self, html: &str, subject: &str) -> Result<Delivery, RenderError> {
        let file_name = print_file_name(subject);

        match self.try_open(html, &file_name) {
            Ok(path) => {
                info!("🖨️ 已在查看器中打开: {}", path.display());
                return Ok(Delivery::Opened(path));
            }
            Err(e) => warn!("⚠️ 无法打开查看器 ({})，改为保存文件", e),
        }

        let path = self.download_dir.join(&file_name);
        write_file(&path, html)?;
        info!("💾 打印版已保存: {}", path.display());
        Ok(Delivery::Downloaded(path))
    }

    fn try_open(&self, html: &str, file_name: &str) -> Result<PathBuf, RenderError> {
        let path = self
            .temp_dir
            .join(format!("{}_{}", uuid::Uuid::new_v4().simple(), file_name));
        write_file(&path, html)?;
        self.viewer.open(&path).map_err(|source| RenderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}

/// 用系统查看器交付打印版；下载目录不可用时保存到 `output_dir`
pub fn deliver_print_document(
    html: &str,
    subject: &str,
    output_dir: &Path,
) -> Result<Delivery, RenderError> {
    PrintDelivery::system(output_dir).deliver(html, subject)
}

fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    let io_err = |source| RenderError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)
}
