/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量（`OCR_` 前缀）
use crate::error::{OcrError, OcrResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 待处理的图片根目录
    pub root_dir: PathBuf,
    /// 同时工作的 worker 数量
    pub concurrency: usize,
    /// 每个 worker 处理两个文件之间的间隔（毫秒）
    pub batch_delay_ms: u64,
    /// 接受的图片扩展名（不区分大小写）
    pub extensions: Vec<String>,
    /// 锁文件超过多少分钟视为失效
    pub stale_after_minutes: u64,
    /// 是否走代理
    pub use_proxy: bool,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 代理重试次数（不含最后一次直连）
    pub max_retries: usize,
    /// 两次尝试之间的固定等待（毫秒）
    pub retry_backoff_ms: u64,
    // --- OCR 接口 ---
    pub ocr_endpoint: String,
    pub ocr_language: String,
    // --- 代理池 ---
    pub proxy_source_url: String,
    pub proxy_cache_file: PathBuf,
    pub proxy_cache_max_age_minutes: u64,
    pub proxy_refresh_minutes: u64,
    // --- 文件约定 ---
    pub lock_suffix: String,
    pub result_extension: String,
    pub owner_id: String,
    pub progress_marker_name: String,
    pub completion_marker_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            concurrency: 3,
            batch_delay_ms: 500,
            extensions: ["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stale_after_minutes: 30,
            use_proxy: true,
            request_timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 1000,
            ocr_endpoint: "https://www.newocr.com/".to_string(),
            ocr_language: "eng".to_string(),
            proxy_source_url: "https://free-proxy-list.net/".to_string(),
            proxy_cache_file: PathBuf::from("proxy_cache.json"),
            proxy_cache_max_age_minutes: 30,
            proxy_refresh_minutes: 30,
            lock_suffix: ".lock".to_string(),
            result_extension: "txt".to_string(),
            owner_id: default_owner_id(),
            progress_marker_name: ".ocr_in_progress.json".to_string(),
            completion_marker_name: ".ocr_complete.json".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OcrError::Config(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| OcrError::Config(format!("无法解析配置文件 {}: {}", path.display(), e)))
    }

    /// 用环境变量覆盖当前值
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("OCR_ROOT_DIR") {
            self.root_dir = PathBuf::from(v);
        }
        self.concurrency = env_parse("OCR_CONCURRENCY").unwrap_or(self.concurrency);
        self.batch_delay_ms = env_parse("OCR_BATCH_DELAY_MS").unwrap_or(self.batch_delay_ms);
        if let Ok(v) = std::env::var("OCR_EXTENSIONS") {
            self.extensions = v
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self.stale_after_minutes =
            env_parse("OCR_STALE_AFTER_MINUTES").unwrap_or(self.stale_after_minutes);
        self.use_proxy = env_parse("OCR_USE_PROXY").unwrap_or(self.use_proxy);
        self.request_timeout_secs =
            env_parse("OCR_REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs);
        self.max_retries = env_parse("OCR_MAX_RETRIES").unwrap_or(self.max_retries);
        self.retry_backoff_ms = env_parse("OCR_RETRY_BACKOFF_MS").unwrap_or(self.retry_backoff_ms);
        self.ocr_endpoint = std::env::var("OCR_ENDPOINT").unwrap_or(self.ocr_endpoint.clone());
        self.ocr_language = std::env::var("OCR_LANGUAGE").unwrap_or(self.ocr_language.clone());
        self.proxy_source_url =
            std::env::var("OCR_PROXY_SOURCE_URL").unwrap_or(self.proxy_source_url.clone());
        if let Ok(v) = std::env::var("OCR_PROXY_CACHE_FILE") {
            self.proxy_cache_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("OCR_OWNER_ID") {
            self.owner_id = v;
        }
    }

    /// 检查明显不合理的配置
    pub fn validate(&self) -> OcrResult<()> {
        if self.concurrency == 0 {
            return Err(OcrError::Config("concurrency 必须大于 0".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(OcrError::Config("至少需要一个图片扩展名".to_string()));
        }
        if self.ocr_endpoint.trim().is_empty() {
            return Err(OcrError::Config("ocr_endpoint 不能为空".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_minutes * 60)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// `<主机名>-<pid>`
fn default_owner_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    format!("{}-{}", host, std::process::id())
}
