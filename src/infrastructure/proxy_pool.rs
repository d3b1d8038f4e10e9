//! 代理池 - 基础设施层
//!
//! 每轮运行构造一次，通过 `Arc` 共享给所有 worker；列表和失败计数都放在互斥锁里。
//!
//! 选择规则：
//! - 轮询，跳过失败次数 ≥ 3 的条目
//! - 所有条目都 ≥ 3 时，全部清零并返回第一个
//! - 失败次数达到 5 的条目直接移除
//!
//! 列表缓存在 JSON 文件中跨进程复用，超过刷新间隔或为空时重新抓取。
//! 本轮移除过的地址记在黑名单里，刷新和加载缓存时都会过滤掉。

use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::infrastructure::http_transport::{HttpRequest, HttpTransport};
use crate::models::{ProxyCache, ProxyEntry};
use regex::Regex;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 达到该失败次数后不再被选中（整池重置除外）
pub const SOFT_FAIL_LIMIT: u32 = 3;
/// 达到该失败次数后从池中移除
pub const EVICT_FAIL_LIMIT: u32 = 5;

/// 代理池参数
#[derive(Debug, Clone)]
pub struct ProxyPoolSettings {
    pub source_url: String,
    pub cache_file: PathBuf,
    pub cache_max_age: Duration,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
}

impl ProxyPoolSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_url: config.proxy_source_url.clone(),
            cache_file: config.proxy_cache_file.clone(),
            cache_max_age: Duration::from_secs(config.proxy_cache_max_age_minutes * 60),
            refresh_interval: Duration::from_secs(config.proxy_refresh_minutes * 60),
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<ProxyEntry>,
    cursor: usize,
    /// 当前列表的抓取时间（epoch 毫秒），写入缓存时原样保存
    fetched_at: Option<i64>,
    /// 刷新失败后，下次重试的时间（epoch 毫秒）
    retry_at: Option<i64>,
    /// 本轮已移除的代理地址
    evicted: HashSet<String>,
}

/// 代理池
pub struct ProxyPool {
    transport: Arc<dyn HttpTransport>,
    settings: ProxyPoolSettings,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// 创建空的代理池，需调用 `init()` 加载
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ProxyPoolSettings) -> Self {
        Self {
            transport,
            settings,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self::new(transport, ProxyPoolSettings::from_config(config))
    }

    /// 使用给定列表创建，视为刚刚抓取
    pub fn with_entries(
        transport: Arc<dyn HttpTransport>,
        settings: ProxyPoolSettings,
        entries: Vec<ProxyEntry>,
    ) -> Self {
        Self {
            transport,
            settings,
            state: Mutex::new(PoolState {
                entries,
                fetched_at: Some(now_millis()),
                ..Default::default()
            }),
        }
    }

    /// 优先加载未过期的缓存，否则从代理源抓取；抓取失败时代理池为空
    pub async fn init(&self) {
        let mut state = self.state.lock().await;

        if let Some(cache) = self.load_cache().await {
            let age = age_of(cache.timestamp);
            let proxies = without_evicted(cache.proxies, &state.evicted);
            if age < self.settings.cache_max_age && !proxies.is_empty() {
                info!(
                    "📦 从缓存加载 {} 个代理 ({} 秒前抓取)",
                    proxies.len(),
                    age.as_secs()
                );
                state.entries = proxies;
                state.cursor = 0;
                state.fetched_at = Some(cache.timestamp);
                return;
            }
            debug!("代理缓存已过期 ({} 秒)", age.as_secs());
        }

        self.refresh_locked(&mut state).await;
    }

    /// 取下一个可用代理，代理池为空（且刷新后仍为空）时返回 None
    pub async fn get_proxy(&self) -> Option<ProxyEntry> {
        let mut state = self.state.lock().await;

        if self.needs_refresh(&state) {
            self.refresh_locked(&mut state).await;
        }

        let len = state.entries.len();
        if len == 0 {
            return None;
        }

        let now = now_millis();
        for offset in 0..len {
            let idx = (state.cursor + offset) % len;
            if state.entries[idx].fails < SOFT_FAIL_LIMIT {
                state.cursor = (idx + 1) % len;
                state.entries[idx].last_used = Some(now);
                return Some(state.entries[idx].clone());
            }
        }

        warn!("⚠️ 所有 {} 个代理的失败次数都已达上限，重置计数", len);
        for entry in state.entries.iter_mut() {
            entry.fails = 0;
        }
        state.cursor = 1 % len;
        state.entries[0].last_used = Some(now);
        let first = state.entries[0].clone();
        self.persist(&state).await;
        Some(first)
    }

    /// 记一次失败，达到上限时移除，并写回缓存
    pub async fn mark_failed(&self, proxy: &ProxyEntry) {
        let mut state = self.state.lock().await;
        let address = proxy.address();

        let Some(idx) = state.entries.iter().position(|e| e.address() == address) else {
            debug!("代理 {} 已不在池中", address);
            return;
        };

        state.entries[idx].fails += 1;
        let fails = state.entries[idx].fails;

        if fails >= EVICT_FAIL_LIMIT {
            state.entries.remove(idx);
            state.evicted.insert(address.clone());
            if idx < state.cursor {
                state.cursor -= 1;
            }
            if state.cursor >= state.entries.len() {
                state.cursor = 0;
            }
            info!(
                "🗑️ 移除代理 {} (失败 {} 次)，剩余 {} 个",
                address,
                fails,
                state.entries.len()
            );
        } else {
            debug!("代理 {} 失败次数: {}", address, fails);
        }

        self.persist(&state).await;
    }

    /// 当前列表快照
    pub async fn entries(&self) -> Vec<ProxyEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn needs_refresh(&self, state: &PoolState) -> bool {
        if state.entries.is_empty() {
            return true;
        }
        if let Some(retry_at) = state.retry_at {
            return now_millis() >= retry_at;
        }
        match state.fetched_at {
            Some(ts) => age_of(ts) > self.settings.refresh_interval,
            None => true,
        }
    }

    async fn refresh_locked(&self, state: &mut PoolState) {
        info!("🌐 正在从 {} 抓取代理列表...", self.settings.source_url);

        match self.fetch_source().await {
            Ok(entries) => {
                let fetched = entries.len();
                let entries = without_evicted(entries, &state.evicted);
                if entries.is_empty() {
                    if fetched == 0 {
                        warn!("⚠️ 代理源没有可用的 HTTPS 代理");
                    } else {
                        warn!("⚠️ 抓取到的 {} 个代理本轮都已被移除", fetched);
                    }
                    self.keep_previous(state);
                    return;
                }
                info!("✓ 获取到 {} 个支持 HTTPS 的代理", entries.len());
                state.entries = entries;
                state.cursor = 0;
                state.fetched_at = Some(now_millis());
                state.retry_at = None;
                self.persist(state).await;
            }
            Err(e) => {
                warn!("⚠️ 抓取代理列表失败: {}", e);
                self.keep_previous(state);
            }
        }
    }

    /// 刷新失败时沿用旧列表，等一个刷新周期后再试；抓取时间不变
    fn keep_previous(&self, state: &mut PoolState) {
        if !state.entries.is_empty() {
            let interval = i64::try_from(self.settings.refresh_interval.as_millis()).unwrap_or(i64::MAX);
            state.retry_at = Some(now_millis().saturating_add(interval));
        }
    }

    async fn fetch_source(&self) -> OcrResult<Vec<ProxyEntry>> {
        let request = HttpRequest::get(&self.settings.source_url, self.settings.request_timeout);
        let reply = self.transport.execute(&request, None).await?;
        if !reply.is_success() {
            return Err(OcrError::network(
                &self.settings.source_url,
                format!("HTTP {}", reply.status),
            ));
        }
        Ok(parse_proxy_table(&reply.body))
    }

    async fn load_cache(&self) -> Option<ProxyCache> {
        let content = fs::read(&self.settings.cache_file).await.ok()?;
        match serde_json::from_slice::<ProxyCache>(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(
                    "⚠️ 代理缓存文件损坏，将重新抓取 {}: {}",
                    self.settings.cache_file.display(),
                    e
                );
                None
            }
        }
    }

    /// 先写临时文件再改名
    async fn persist(&self, state: &PoolState) {
        let cache = ProxyCache {
            timestamp: state.fetched_at.unwrap_or_else(now_millis),
            proxies: state.entries.clone(),
        };
        let json = match serde_json::to_vec_pretty(&cache) {
            Ok(json) => json,
            Err(e) => {
                warn!("⚠️ 序列化代理缓存失败: {}", e);
                return;
            }
        };

        let tmp = self.settings.cache_file.with_extension("json.tmp");
        let result = async {
            fs::write(&tmp, &json).await?;
            fs::rename(&tmp, &self.settings.cache_file).await
        }
        .await;

        if let Err(e) = result {
            warn!(
                "⚠️ 写入代理缓存失败 {}: {}",
                self.settings.cache_file.display(),
                e
            );
        }
    }
}

/// 解析代理列表页面中的表格
///
/// 列顺序：IP, Port, Code, Country, Anonymity, Google, Https, Last Checked；
/// 只保留 Https 列为 `yes` 的行，重复地址只保留第一个
pub fn parse_proxy_table(html: &str) -> Vec<ProxyEntry> {
    static ROW: OnceLock<Regex> = OnceLock::new();
    static CELL: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let row_re = ROW.get_or_init(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid regex"));
    let cell_re =
        CELL.get_or_init(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid regex"));
    let tag_re = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for row in row_re.captures_iter(html) {
        let cells: Vec<String> = cell_re
            .captures_iter(&row[1])
            .map(|c| tag_re.replace_all(&c[1], "").trim().to_string())
            .collect();

        if cells.len() < 7 || !cells[6].eq_ignore_ascii_case("yes") {
            continue;
        }
        let Ok(ip) = cells[0].parse::<Ipv4Addr>() else {
            continue;
        };
        let Ok(port) = cells[1].parse::<u16>() else {
            continue;
        };
        if port == 0 {
            continue;
        }

        let entry = ProxyEntry::new(ip.to_string(), port);
        if seen.insert(entry.address()) {
            entries.push(entry);
        }
    }

    entries
}

fn without_evicted(entries: Vec<ProxyEntry>, evicted: &HashSet<String>) -> Vec<ProxyEntry> {
    entries
        .into_iter()
        .filter(|e| !evicted.contains(&e.address()))
        .collect()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn age_of(timestamp_millis: i64) -> Duration {
    let diff = now_millis() - timestamp_millis;
    Duration::from_millis(diff.max(0) as u64)
}
