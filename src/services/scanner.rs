//! 文件扫描服务 - 业务能力层
//!
//! 递归遍历根目录，按扩展名白名单找出候选图片

use crate::error::{OcrError, OcrResult};
use crate::models::Resource;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ResourceScanner {
    extensions: HashSet<String>,
}

impl ResourceScanner {
    /// 扩展名不区分大小写，可带前导点
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// 根目录必须存在且是目录
    pub fn validate_root(root: &Path) -> OcrResult<()> {
        if !root.exists() {
            return Err(OcrError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(OcrError::RootNotDirectory(root.to_path_buf()));
        }
        Ok(())
    }

    /// 扫描候选文件，按路径排序；子目录读取失败只记日志，根目录本身读不了才报错
    pub fn scan(&self, root: &Path) -> OcrResult<Vec<Resource>> {
        Self::validate_root(root)?;
        // 结果中的路径一律为绝对路径
        let root = root.canonicalize().map_err(|e| OcrError::ScanFailed {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let root = root.as_path();

        let mut resources = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(OcrError::ScanFailed {
                        path: root.to_path_buf(),
                        message: e.to_string(),
                    })
                }
                Err(e) => {
                    warn!("⚠️ 跳过无法读取的路径: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let resource = Resource::new(entry.path());
            if resource
                .extension()
                .map(|ext| self.extensions.contains(&ext))
                .unwrap_or(false)
            {
                debug!("发现图片: {}", resource);
                resources.push(resource);
            }
        }

        info!("📁 在 {} 中找到 {} 个图片", root.display(), resources.len());
        Ok(resources)
    }
}
