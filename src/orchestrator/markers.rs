//! 运行标记文件
//!
//! - 进行中标记：运行期间存在，记录开始时间、进程标识、配置快照和分类计数
//! - 完成标记：运行结束时写入，记录耗时、各类计数和每个文件的结果；写入后删除进行中标记

use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::models::{JobRecord, RunCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMarker {
    pub started_at: DateTime<Utc>,
    pub owner_id: String,
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<usize>,
}

impl ProgressMarker {
    pub fn new(config: &Config, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            owner_id: config.owner_id.clone(),
            config: config.clone(),
            total: None,
            pending: None,
            skipped: None,
            locked: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMarker<'a> {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub owner_id: &'a str,
    pub counts: RunCounts,
    pub details: &'a [JobRecord],
}

/// 标记文件的位置与读写
#[derive(Debug, Clone)]
pub struct RunMarkers {
    progress_path: PathBuf,
    completion_path: PathBuf,
}

impl RunMarkers {
    /// 两个标记都放在根目录下
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            progress_path: root.join(&config.progress_marker_name),
            completion_path: root.join(&config.completion_marker_name),
        }
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    pub fn completion_path(&self) -> &Path {
        &self.completion_path
    }

    pub async fn write_progress(&self, marker: &ProgressMarker) -> OcrResult<()> {
        write_json(&self.progress_path, marker).await
    }

    /// 写入完成标记并删除进行中标记
    pub async fn complete(&self, marker: &CompletionMarker<'_>) -> OcrResult<()> {
        write_json(&self.completion_path, marker).await?;
        self.remove_progress().await;
        Ok(())
    }

    pub async fn remove_progress(&self) {
        match fs::remove_file(&self.progress_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "⚠️ 删除进行中标记失败 {}: {}",
                self.progress_path.display(),
                e
            ),
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> OcrResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| {
        OcrError::persistence(path, std::io::Error::new(ErrorKind::InvalidData, e))
    })?;
    fs::write(path, json)
        .await
        .map_err(|e| OcrError::persistence(path, e))
}
