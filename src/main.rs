use anyhow::{Context, Result};
use ocr_batch::utils::logging;
use ocr_batch::{BatchRunner, Config};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置：配置文件 → 环境变量 → 命令行根目录
    let mut config = match std::env::var_os("OCR_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            Config::from_toml_file(&path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))?
        }
        None => Config::default(),
    };
    config.apply_env();
    if let Some(root) = std::env::args_os().nth(1) {
        config.root_dir = PathBuf::from(root);
    }

    // 初始化并运行
    let runner = BatchRunner::new(config).context("配置无效")?;
    let summary = runner.run().await.context("批量运行终止")?;

    if summary.counts.failed > 0 {
        tracing::warn!("⚠️ 有 {} 个文件处理失败，可重新运行补齐", summary.counts.failed);
    }

    Ok(())
}
