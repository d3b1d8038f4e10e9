//! 批量 OCR 控制器 - 编排层
//!
//! ## 职责
//!
//! 1. **校验**：根目录不存在、不是目录、没有候选图片时直接终止
//! 2. **分类**：已有结果 → Skipped，锁未失效 → Locked，其余进入待处理队列
//! 3. **调度**：把待处理队列交给 `WorkerPool`，每个文件走一遍 `OcrFlow`
//! 4. **汇总**：合并所有结果，写完成标记，删除进行中标记
//!
//! 单个文件失败不会中断整批；代理池、锁管理器等共享资源在这里构造一次，通过 `Arc` 传给 worker。

use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::infrastructure::{HttpTransport, LockManager, ProxyPool, ReqwestTransport};
use crate::models::{JobOutcome, JobRecord, Resource, RunSummary};
use crate::orchestrator::markers::{CompletionMarker, ProgressMarker, RunMarkers};
use crate::orchestrator::worker_pool::WorkerPool;
use crate::services::{MarkupResponseParser, OcrService, ResilientFetchClient, ResourceScanner, ResponseParser};
use crate::utils::logging;
use crate::workflow::OcrFlow;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// 文件分类结果
#[derive(Debug, Default)]
struct Classified {
    /// 已有结果、被锁定或结果文件冲突，无需处理
    settled: Vec<JobRecord>,
    pending: Vec<Resource>,
    skipped: usize,
    locked: usize,
}

/// 批量运行控制器
pub struct BatchRunner {
    config: Config,
    transport: Arc<dyn HttpTransport>,
    parser: Arc<dyn ResponseParser>,
}

impl BatchRunner {
    /// 使用 reqwest 传输层
    pub fn new(config: Config) -> OcrResult<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()?))
    }

    /// 使用自定义传输层
    pub fn with_transport(config: Config, transport: Arc<dyn HttpTransport>) -> OcrResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            parser: Arc::new(MarkupResponseParser::new()),
        })
    }

    /// 替换 OCR 站点的页面解析器
    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行一轮，只有扫描前的致命错误会返回 Err
    pub async fn run(&self) -> OcrResult<RunSummary> {
        let started = Instant::now();
        let started_at = Utc::now();
        let root = self.config.root_dir.clone();

        ResourceScanner::validate_root(&root)?;
        logging::log_startup(&self.config);

        let markers = RunMarkers::new(&root, &self.config);
        let mut progress = ProgressMarker::new(&self.config, started_at);
        markers.write_progress(&progress).await?;

        let resources = match self.scan().await {
            Ok(resources) if resources.is_empty() => {
                markers.remove_progress().await;
                return Err(OcrError::NoCandidates(root));
            }
            Ok(resources) => resources,
            Err(e) => {
                markers.remove_progress().await;
                return Err(e);
            }
        };

        let locks = Arc::new(LockManager::from_config(&self.config));
        let total = resources.len();
        let classified = self.classify(resources, &locks).await;

        logging::log_classified(
            total,
            classified.skipped,
            classified.locked,
            classified.pending.len(),
        );
        progress.total = Some(total);
        progress.pending = Some(classified.pending.len());
        progress.skipped = Some(classified.skipped);
        progress.locked = Some(classified.locked);
        if let Err(e) = markers.write_progress(&progress).await {
            warn!("⚠️ 更新进行中标记失败: {}", e);
        }

        let mut records = classified.settled;
        if !classified.pending.is_empty() {
            let flow = Arc::new(self.build_flow(locks).await);
            let pool = WorkerPool::new(self.config.concurrency).with_delay(self.config.batch_delay());
            let processed = pool
                .run(classified.pending, move |resource: Resource| {
                    let flow = Arc::clone(&flow);
                    async move { flow.run(resource).await }
                })
                .await;
            records.extend(processed);
        }
        records.sort_by(|a, b| a.resource.cmp(&b.resource));

        let summary = RunSummary::from_records(records);
        let elapsed = started.elapsed();

        let completion = CompletionMarker {
            started_at,
            completed_at: Utc::now(),
            elapsed_seconds: elapsed.as_secs_f64(),
            owner_id: &self.config.owner_id,
            counts: summary.counts,
            details: &summary.records,
        };
        if let Err(e) = markers.complete(&completion).await {
            error!("❌ 写入完成标记失败: {}", e);
        }

        logging::print_final_stats(&summary, elapsed, markers.completion_path());
        Ok(summary)
    }

    async fn scan(&self) -> OcrResult<Vec<Resource>> {
        let scanner = ResourceScanner::new(&self.config.extensions);
        let root = self.config.root_dir.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| OcrError::ScanFailed {
                path: self.config.root_dir.clone(),
                message: e.to_string(),
            })?
    }

    async fn classify(&self, resources: Vec<Resource>, locks: &LockManager) -> Classified {
        let mut classified = Classified::default();
        // 结果文件 → 本轮负责写它的图片
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

        for resource in resources {
            let result_path = resource.result_path(&self.config.result_extension);
            if result_path.is_file() {
                classified.skipped += 1;
                classified.settled.push(JobRecord::new(
                    resource.path(),
                    JobOutcome::Skipped {
                        existing_output_path: result_path,
                    },
                ));
                continue;
            }

            if let Some(owner) = claimed.get(&result_path) {
                let reason = format!(
                    "结果文件 {} 与 {} 冲突",
                    result_path.display(),
                    owner.display()
                );
                warn!("⚠️ {}: {}", resource, reason);
                classified
                    .settled
                    .push(JobRecord::new(resource.path(), JobOutcome::Failure { reason }));
                continue;
            }
            claimed.insert(result_path, resource.path().to_path_buf());

            if locks.is_locked(&resource).await {
                let owner = locks
                    .read_owner(&resource)
                    .await
                    .map(|info| info.owner_id)
                    .unwrap_or_else(|| "未知".to_string());
                classified.locked += 1;
                classified.settled.push(JobRecord::new(
                    resource.path(),
                    JobOutcome::Locked {
                        reason: format!("锁文件未失效 (持有者: {})", owner),
                    },
                ));
                continue;
            }

            classified.pending.push(resource);
        }

        classified
    }

    /// 构造本轮共享的代理池、请求客户端和处理流程
    async fn build_flow(&self, locks: Arc<LockManager>) -> OcrFlow {
        let proxies = if self.config.use_proxy {
            let pool = ProxyPool::from_config(Arc::clone(&self.transport), &self.config);
            pool.init().await;
            info!("🌐 代理池就绪: {} 个代理", pool.len().await);
            Some(Arc::new(pool))
        } else {
            None
        };

        let client = ResilientFetchClient::new(
            Arc::clone(&self.transport),
            proxies,
            self.config.retry_backoff(),
        );
        let ocr = OcrService::new(client, Arc::clone(&self.parser), &self.config);

        OcrFlow::new(locks, Arc::new(ocr), self.config.result_extension.clone())
    }
}
