/// 日志工具模块
///
/// 初始化 tracing，并提供批处理各阶段的日志输出
use crate::config::Config;
use crate::models::RunSummary;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 初始化日志，默认 `info`，可通过 `RUST_LOG` 覆盖；重复调用无副作用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 批量 OCR 启动");
    info!("📂 根目录: {}", config.root_dir.display());
    info!("📊 并发数: {}", config.concurrency);
    info!(
        "🌐 代理: {} | 重试: {} | 超时: {} 秒",
        if config.use_proxy { "开启" } else { "关闭" },
        config.max_retries,
        config.request_timeout_secs
    );
    info!("🔑 进程标识: {}", config.owner_id);
    info!("{}", "=".repeat(60));
}

/// 记录分类结果
pub fn log_classified(total: usize, skipped: usize, locked: usize, pending: usize) {
    info!("✓ 共找到 {} 个图片", total);
    info!("⏭️ 已有结果: {}", skipped);
    info!("🔒 被锁定: {}", locked);
    info!("📋 待处理: {}\n", pending);
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary, elapsed: Duration, completion_marker: &Path) {
    let c = &summary.counts;
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("耗时: {:.1} 秒", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", c.successful, c.total);
    info!("❌ 失败: {}", c.failed);
    info!("⏭️ 跳过: {}", c.skipped);
    info!("🔒 锁定: {}", c.locked);
    for (path, reason) in summary.failures() {
        warn!("  ✗ {}: {}", path.display(), reason);
    }
    info!("{}", "=".repeat(60));
    info!("\n完成标记已保存至: {}", completion_marker.display());
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    if flat.chars().count() > max_len {
        flat.chars().take(max_len).collect::<String>() + "..."
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("一二三四五六", 3), "一二三...");
        assert_eq!(truncate_text("line1\nline2", 20), "line1 line2");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }
}
