//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一轮批量运行的调度和统计，不做具体的识别逻辑。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量运行控制器
//! - 校验根目录、扫描候选图片
//! - 分类：已有结果 / 被锁定 / 待处理
//! - 构造共享的代理池、请求客户端和 `OcrFlow`
//! - 汇总结果并输出统计
//!
//! ### `worker_pool` - 工作池
//! - 固定数量的 worker 消费共享队列
//! - 每个元素只被处理一次
//!
//! ### `markers` - 运行标记
//! - 进行中标记和完成标记的读写
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Resource>)
//!     ↓
//! worker_pool (并发消费队列)
//!     ↓
//! workflow::OcrFlow (处理单个 Resource)
//!     ↓
//! services (能力层：scanner / fetch_client / ocr_service)
//!     ↓
//! infrastructure (基础设施：lock_manager / proxy_pool / http_transport)
//! ```

pub mod batch_processor;
pub mod markers;
pub mod worker_pool;

// 重新导出主要类型
pub use batch_processor::BatchRunner;
pub use markers::{CompletionMarker, ProgressMarker, RunMarkers};
pub use worker_pool::WorkerPool;
