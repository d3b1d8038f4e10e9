//! 代理条目与代理缓存文件格式

use serde::{Deserialize, Serialize};

/// 一个代理出口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEntry {
    pub ip: String,
    pub port: u16,
    /// 连续失败次数，只增不减，直到整池重置
    #[serde(default)]
    pub fails: u32,
    /// 上次被选中的时间（epoch 毫秒）
    #[serde(default)]
    pub last_used: Option<i64>,
}

impl ProxyEntry {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            fails: 0,
            last_used: None,
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// 给 HTTP 客户端用的代理 URL
    pub fn url(&self) -> String {
        format!("http://{}", self.address())
    }
}

/// 代理缓存文件 `{ timestamp, proxies: [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyCache {
    /// 列表获取时间（epoch 毫秒）
    pub timestamp: i64,
    pub proxies: Vec<ProxyEntry>,
}
