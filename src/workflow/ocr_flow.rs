//! 单个文件处理流程 - 流程层
//!
//! 加锁 → 识别 → 写结果文件 → 释放锁。
//! 任何一步出错都转成 `JobOutcome::Failure`，并且一定会释放锁。

use crate::error::{OcrError, OcrResult};
use crate::infrastructure::LockManager;
use crate::models::{JobOutcome, JobRecord, Resource};
use crate::services::OcrService;
use crate::utils::logging::truncate_text;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

/// 单个文件处理流程
///
/// 不持有批次信息，多个 worker 共享同一个实例
pub struct OcrFlow {
    locks: Arc<LockManager>,
    ocr: Arc<OcrService>,
    result_extension: String,
}

impl OcrFlow {
    pub fn new(locks: Arc<LockManager>, ocr: Arc<OcrService>, result_extension: impl Into<String>) -> Self {
        Self {
            locks,
            ocr,
            result_extension: result_extension.into(),
        }
    }

    pub async fn run(&self, resource: Resource) -> JobRecord {
        let name = resource.file_name();

        match self.locks.acquire(&resource).await {
            Ok(true) => {}
            Ok(false) => {
                info!("[{}] 🔒 正被其他进程处理，跳过", name);
                let reason = OcrError::LockConflict {
                    path: resource.path().to_path_buf(),
                }
                .to_string();
                return JobRecord::new(resource.path(), JobOutcome::Locked { reason });
            }
            Err(e) => {
                error!("[{}] ❌ 加锁失败: {}", name, e);
                return JobRecord::new(resource.path(), JobOutcome::failure(e));
            }
        }

        let outcome = match self.process(&resource).await {
            Ok((text, output_path)) => {
                info!("[{}] ✅ 识别完成: {}", name, truncate_text(&text, 40));
                JobOutcome::Success { text, output_path }
            }
            Err(e) => {
                error!("[{}] ❌ 处理失败: {}", name, e);
                JobOutcome::failure(e)
            }
        };

        if !self.locks.release(&resource).await {
            warn!("[{}] ⚠️ 锁文件未能删除，将在失效后被覆盖", name);
        }

        JobRecord::new(resource.path(), outcome)
    }

    async fn process(&self, resource: &Resource) -> OcrResult<(String, PathBuf)> {
        let text = self.ocr.recognize(resource).await?;
        let output_path = resource.result_path(&self.result_extension);
        write_result(&output_path, &text).await?;
        Ok((text, output_path))
    }
}

/// 先写临时文件再改名，避免半截结果被下一轮当成"已完成"
async fn write_result(output_path: &Path, text: &str) -> OcrResult<()> {
    let mut tmp = output_path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, text.as_bytes())
        .await
        .map_err(|e| OcrError::persistence(&tmp, e))?;
    fs::rename(&tmp, output_path)
        .await
        .map_err(|e| OcrError::persistence(output_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::HttpTransport;
    use crate::services::fakes::{reply, FakeOcrSite, ScriptedTransport};
    use crate::services::{MarkupResponseParser, ResilientFetchClient};
    use std::time::Duration;
    use tempfile::TempDir;

    fn flow(transport: Arc<dyn HttpTransport>) -> OcrFlow {
        let config = Config {
            ocr_endpoint: "https://ocr.example/upload".to_string(),
            max_retries: 0,
            use_proxy: false,
            ..Default::default()
        };
        let client = ResilientFetchClient::new(transport, None, Duration::ZERO);
        let ocr = OcrService::new(client, Arc::new(MarkupResponseParser::new()), &config);
        OcrFlow::new(
            Arc::new(LockManager::from_config(&config)),
            Arc::new(ocr),
            "txt",
        )
    }

    fn image(dir: &TempDir, name: &str) -> Resource {
        let path = dir.path().join(name);
        std::fs::write(&path, b"img").unwrap();
        Resource::new(path)
    }

    #[tokio::test]
    async fn test_success_writes_result_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let resource = image(&dir, "receipt.jpg");

        let record = flow(Arc::new(FakeOcrSite::default())).run(resource.clone()).await;

        match &record.outcome {
            JobOutcome::Success { text, output_path } => {
                assert_eq!(text, "text of receipt.jpg");
                assert_eq!(output_path, &dir.path().join("receipt.txt"));
                assert_eq!(std::fs::read_to_string(output_path).unwrap(), *text);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!resource.lock_path(".lock").exists());
        assert!(!dir.path().join("receipt.txt.part").exists());
    }

    #[tokio::test]
    async fn test_failure_still_releases_lock() {
        let dir = TempDir::new().unwrap();
        let resource = image(&dir, "blurry.png");
        let transport = Arc::new(ScriptedTransport::new(vec![reply(500, "oops")]));

        let record = flow(transport).run(resource.clone()).await;

        match &record.outcome {
            JobOutcome::Failure { reason } => assert!(reason.contains("500")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!resource.lock_path(".lock").exists());
        assert!(!resource.has_result("txt"));
    }

    #[tokio::test]
    async fn test_held_lock_yields_locked_without_network() {
        let dir = TempDir::new().unwrap();
        let resource = image(&dir, "busy.png");
        std::fs::write(resource.lock_path(".lock"), "other-host-7:1").unwrap();
        let site = Arc::new(FakeOcrSite::default());

        let record = flow(site.clone()).run(resource.clone()).await;

        assert!(matches!(record.outcome, JobOutcome::Locked { .. }));
        assert_eq!(site.calls(), 0);
        assert!(resource.lock_path(".lock").exists());
    }
}
