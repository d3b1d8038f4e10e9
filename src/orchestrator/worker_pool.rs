//! 工作池 - 编排层
//!
//! 固定数量的 worker 共同消费一个共享队列：
//! - 启动 `min(concurrency, 队列长度)` 个 worker
//! - 出队和写结果都在互斥锁内完成，每个元素只会被处理一次
//! - 所有 worker 结束后才返回，结果顺序不保证

use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 工作池
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    delay: Duration,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay: Duration::ZERO,
        }
    }

    /// 每个 worker 处理相邻两个元素之间的等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 实际启动的 worker 数
    pub fn worker_count(&self, pending: usize) -> usize {
        self.concurrency.min(pending)
    }

    /// 处理队列中的所有元素
    pub async fn run<T, O, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<O>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let total = items.len();
        let workers = self.worker_count(total);
        if workers == 0 {
            return Vec::new();
        }

        info!("👷 启动 {} 个 worker 处理 {} 个任务", workers, total);

        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let task = Arc::new(task);

        let handles: Vec<_> = (1..=workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let results = Arc::clone(&results);
                let task = Arc::clone(&task);
                let delay = self.delay;

                tokio::spawn(async move {
                    let mut processed = 0usize;
                    loop {
                        if processed > 0 && !delay.is_zero() {
                            sleep(delay).await;
                        }

                        // 出队必须是一次加锁内完成
                        let next = queue.lock().await.pop_front();
                        let Some(item) = next else {
                            break;
                        };

                        let output = task(item).await;
                        results.lock().await.push(output);
                        processed += 1;
                    }
                    debug!("[worker {}] 队列已空，共处理 {} 个", worker_id, processed);
                })
            })
            .collect();

        for (idx, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!("[worker {}] 异常退出: {}", idx + 1, e);
            }
        }

        let mut guard = results.lock().await;
        std::mem::take(&mut *guard)
    }
}
