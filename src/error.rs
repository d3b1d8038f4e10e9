//! 错误类型
//!
//! 单个文件的错误（锁冲突、网络、解析、落盘）在任务边界被转换成 `JobOutcome::Failure`，
//! 只有扫描前的致命错误（根目录不存在、不是目录、没有候选文件）会一直传到顶层。

use std::path::PathBuf;
use thiserror::Error;

/// 批量 OCR 引擎的错误类型
#[derive(Debug, Error)]
pub enum OcrError {
    /// 文件正被其他进程处理（正常的批处理结果，不算故障）
    #[error("文件已被锁定: {}", path.display())]
    LockConflict { path: PathBuf },

    /// 所有代理尝试以及直连兜底都失败了
    #[error("代理与直连均失败 ({attempts} 次尝试): {last_error}")]
    ProxyExhausted { attempts: usize, last_error: String },

    /// 传输层错误
    #[error("网络请求失败 ({url}): {message}")]
    NetworkFailure { url: String, message: String },

    /// 响应中缺少期望的定位符或内容
    #[error("响应解析失败: {0}")]
    ResponseParseFailure(String),

    /// 结果文件或锁文件读写失败
    #[error("文件读写失败 ({}): {source}", path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 根目录不存在
    #[error("根目录不存在: {}", .0.display())]
    RootNotFound(PathBuf),

    /// 根路径不是目录
    #[error("根路径不是目录: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// 过滤后没有任何候选文件
    #[error("目录中没有匹配的图片文件: {}", .0.display())]
    NoCandidates(PathBuf),

    /// 无法遍历根目录
    #[error("扫描目录失败 ({}): {message}", path.display())]
    ScanFailed { path: PathBuf, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl OcrError {
    /// 创建网络错误
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        OcrError::NetworkFailure {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// 创建文件读写错误
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OcrError::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    /// 创建解析错误
    pub fn parse(message: impl Into<String>) -> Self {
        OcrError::ResponseParseFailure(message.into())
    }

    /// 是否是扫描前的致命错误（需要终止整个运行）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OcrError::RootNotFound(_)
                | OcrError::RootNotDirectory(_)
                | OcrError::NoCandidates(_)
                | OcrError::ScanFailed { .. }
                | OcrError::Config(_)
        )
    }
}

/// 引擎结果类型
pub type OcrResult<T> = Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(OcrError::RootNotFound(PathBuf::from("/nope")).is_fatal());
        assert!(OcrError::NoCandidates(PathBuf::from("/tmp")).is_fatal());
        assert!(!OcrError::parse("没有定位符").is_fatal());
        assert!(!OcrError::network("http://x", "timeout").is_fatal());
        assert!(!OcrError::LockConflict {
            path: PathBuf::from("a.png")
        }
        .is_fatal());
    }

    #[test]
    fn test_display_contains_reason() {
        let err = OcrError::ProxyExhausted {
            attempts: 4,
            last_error: "HTTP 503".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4"));
        assert!(msg.contains("HTTP 503"));
    }
}
