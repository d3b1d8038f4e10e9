//! # OCR Batch
//!
//! 批量图片 OCR 编排引擎：扫描目录，多 worker 并发上传识别，结果写到图片旁边
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享资源，只暴露能力
//! - `LockManager` - 基于锁文件的跨进程互斥
//! - `ProxyPool` - 代理列表的获取、缓存、轮询和淘汰
//! - `HttpTransport` - HTTP 请求能力（生产用 reqwest）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ResourceScanner` - 递归扫描候选图片
//! - `ResilientFetchClient` - 代理重试 + 直连兜底
//! - `OcrService` - 上传图片、解析结果链接、下载文本
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件"的完整处理流程
//! - `OcrFlow` - 加锁 → 识别 → 写结果 → 释放锁
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量运行控制器
//! - `orchestrator/worker_pool` - 工作池
//! - `orchestrator/markers` - 进行中 / 完成标记
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{OcrError, OcrResult};
pub use infrastructure::{HttpTransport, LockManager, ProxyPool, ReqwestTransport};
pub use models::{JobOutcome, JobRecord, Resource, RunCounts, RunSummary};
pub use orchestrator::{BatchRunner, WorkerPool};
pub use workflow::OcrFlow;
