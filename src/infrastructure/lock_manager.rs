//! 锁管理器 - 基础设施层
//!
//! 每个图片对应一个旁路锁文件（原路径 + 后缀），内容为 `ownerId:创建时间毫秒`，
//! 年龄按文件修改时间计算。锁是建议性的：超过失效窗口的锁视为被遗弃，任何进程都可以覆盖。

use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::models::Resource;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// 锁文件中记录的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub owner_id: String,
    pub created_at_millis: i64,
}

/// 锁管理器
pub struct LockManager {
    suffix: String,
    stale_after: Duration,
    owner_id: String,
}

impl LockManager {
    pub fn new(suffix: impl Into<String>, stale_after: Duration, owner_id: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            stale_after,
            owner_id: owner_id.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.lock_suffix.clone(),
            config.stale_after(),
            config.owner_id.clone(),
        )
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// 尝试获取锁
    ///
    /// 返回 `Ok(false)` 表示文件正被其他进程处理。
    /// 创建使用 create-new 语义，两个进程不会同时从"无锁"状态拿到同一把锁；
    /// 覆盖失效锁（删除后重建）这一步仍然存在竞争窗口。
    pub async fn acquire(&self, resource: &Resource) -> OcrResult<bool> {
        let lock_path = resource.lock_path(&self.suffix);

        match self.create_marker(&lock_path).await {
            Ok(()) => {
                debug!("🔒 已加锁: {}", lock_path.display());
                return Ok(true);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(OcrError::persistence(lock_path, e)),
        }

        let age = match marker_age(&lock_path).await {
            Some(age) => age,
            // 锁在检查间隙被释放，重新尝试一次
            None => return self.create_or_busy(&lock_path).await,
        };

        if !is_stale(age, self.stale_after) {
            debug!(
                "文件被锁定 ({} 秒前创建): {}",
                age.as_secs(),
                resource.file_name()
            );
            return Ok(false);
        }

        info!(
            "♻️ 覆盖失效锁 ({} 分钟前创建): {}",
            age.as_secs() / 60,
            lock_path.display()
        );
        match fs::remove_file(&lock_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(OcrError::persistence(lock_path, e)),
        }
        self.create_or_busy(&lock_path).await
    }

    /// 释放锁，失败只记日志；泄漏的锁会在失效窗口过后被覆盖
    pub async fn release(&self, resource: &Resource) -> bool {
        let lock_path = resource.lock_path(&self.suffix);
        match fs::remove_file(&lock_path).await {
            Ok(()) => {
                debug!("🔓 已释放锁: {}", lock_path.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("⚠️ 释放锁失败 {}: {}", lock_path.display(), e);
                false
            }
        }
    }

    /// 锁文件存在且未失效
    pub async fn is_locked(&self, resource: &Resource) -> bool {
        match marker_age(&resource.lock_path(&self.suffix)).await {
            Some(age) => !is_stale(age, self.stale_after),
            None => false,
        }
    }

    /// 读取锁文件中的持有者信息
    pub async fn read_owner(&self, resource: &Resource) -> Option<LockInfo> {
        let content = fs::read_to_string(resource.lock_path(&self.suffix))
            .await
            .ok()?;
        parse_lock_content(&content)
    }

    async fn create_or_busy(&self, lock_path: &Path) -> OcrResult<bool> {
        match self.create_marker(lock_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(OcrError::persistence(lock_path, e)),
        }
    }

    async fn create_marker(&self, lock_path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
            .await?;

        let content = format!("{}:{}", self.owner_id, chrono::Utc::now().timestamp_millis());
        if let Err(e) = file.write_all(content.as_bytes()).await {
            drop(file);
            let _ = fs::remove_file(lock_path).await;
            return Err(e);
        }
        file.flush().await
    }
}

/// 年龄达到窗口即视为失效
pub fn is_stale(age: Duration, stale_after: Duration) -> bool {
    age >= stale_after
}

/// 锁文件年龄；文件不存在时返回 None，修改时间在未来时按 0 计
async fn marker_age(lock_path: &Path) -> Option<Duration> {
    let modified = fs::metadata(lock_path).await.ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

fn parse_lock_content(content: &str) -> Option<LockInfo> {
    let (owner, millis) = content.trim().rsplit_once(':')?;
    Some(LockInfo {
        owner_id: owner.to_string(),
        created_at_millis: millis.parse().ok()?,
    })
}
