//! 容错请求客户端 - 业务能力层
//!
//! 依次尝试：最多 `max_retries` 次代理请求 → 一次直连。
//! 任何阶段拿到 2xx 立即返回；代理失败（非 2xx 或传输错误）会先记到代理池再等待重试。

use crate::error::{OcrError, OcrResult};
use crate::infrastructure::http_transport::{HttpReply, HttpRequest, HttpTransport};
use crate::infrastructure::proxy_pool::ProxyPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 容错请求客户端
pub struct ResilientFetchClient {
    transport: Arc<dyn HttpTransport>,
    proxies: Option<Arc<ProxyPool>>,
    backoff: Duration,
}

impl ResilientFetchClient {
    /// `proxies` 为 None 时只走直连
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        proxies: Option<Arc<ProxyPool>>,
        backoff: Duration,
    ) -> Self {
        Self {
            transport,
            proxies,
            backoff,
        }
    }

    /// 发送请求，全部失败时返回 `ProxyExhausted`
    pub async fn fetch_with_resilience(
        &self,
        request: &HttpRequest,
        max_retries: usize,
    ) -> OcrResult<HttpReply> {
        let mut attempts = 0;
        let mut last_error = String::from("未发出请求");

        if let Some(pool) = &self.proxies {
            for attempt in 1..=max_retries {
                let Some(proxy) = pool.get_proxy().await else {
                    info!("代理池为空，改为直连");
                    break;
                };
                attempts += 1;

                match self.transport.execute(request, Some(&proxy)).await {
                    Ok(reply) if reply.is_success() => {
                        debug!("✓ 代理 {} 请求成功", proxy.address());
                        return Ok(reply);
                    }
                    Ok(reply) => last_error = format!("HTTP {} (代理 {})", reply.status, proxy.address()),
                    Err(e) => last_error = e.to_string(),
                }

                warn!(
                    "⚠️ 代理请求失败 (尝试 {}/{}): {}",
                    attempt, max_retries, last_error
                );
                pool.mark_failed(&proxy).await;
                sleep(self.backoff).await;
            }
        }

        attempts += 1;
        match self.transport.execute(request, None).await {
            Ok(reply) if reply.is_success() => {
                debug!("✓ 直连请求成功");
                return Ok(reply);
            }
            Ok(reply) => last_error = format!("HTTP {} (直连)", reply.status),
            Err(e) => last_error = e.to_string(),
        }

        warn!("❌ 请求彻底失败 ({} 次尝试): {}", attempts, last_error);
        Err(OcrError::ProxyExhausted {
            attempts,
            last_error,
        })
    }
}
