//! 基础设施层（Infrastructure）
//!
//! 持有文件系统锁、网络传输和代理池这些共享资源，只暴露能力，不认识"批次"和"结果"

pub mod http_transport;
pub mod lock_manager;
pub mod proxy_pool;

pub use http_transport::{FilePart, HttpReply, HttpRequest, HttpTransport, ReqwestTransport};
pub use lock_manager::{LockInfo, LockManager};
pub use proxy_pool::{parse_proxy_table, ProxyPool, ProxyPoolSettings};
