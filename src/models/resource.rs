//! 资源：一个待 OCR 的图片文件

use std::ffi::OsString;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 待处理的图片文件
///
/// 只保存路径，"是否已有结果"、"是否被锁"这类状态每次按需从文件系统计算
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    path: PathBuf,
}

impl Resource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 小写扩展名
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// 文件名（日志用）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 同目录、同名、换扩展名的结果文件
    pub fn result_path(&self, result_extension: &str) -> PathBuf {
        self.path.with_extension(result_extension)
    }

    /// 在原路径后追加后缀的锁文件，如 `a.png` → `a.png.lock`
    pub fn lock_path(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn has_result(&self, result_extension: &str) -> bool {
        self.result_path(result_extension).is_file()
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
