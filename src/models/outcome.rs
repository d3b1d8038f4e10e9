//! 单个文件的处理结果与整轮汇总

use serde::Serialize;
use std::path::PathBuf;

/// 单个文件在一轮运行中的结果，产生后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    /// 识别成功并已写入结果文件
    Success {
        #[serde(skip_serializing)]
        text: String,
        output_path: PathBuf,
    },
    /// 处理失败，附可读原因
    Failure { reason: String },
    /// 被其他进程锁定，未处理
    Locked { reason: String },
    /// 已有结果文件，跳过
    Skipped { existing_output_path: PathBuf },
}

impl JobOutcome {
    pub fn failure(reason: impl ToString) -> Self {
        JobOutcome::Failure {
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobOutcome::Success { .. } => "success",
            JobOutcome::Failure { .. } => "failure",
            JobOutcome::Locked { .. } => "locked",
            JobOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// 文件路径 + 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub resource: PathBuf,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobRecord {
    pub fn new(resource: impl Into<PathBuf>, outcome: JobOutcome) -> Self {
        Self {
            resource: resource.into(),
            outcome,
        }
    }
}

/// 各类结果的数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub locked: usize,
}

/// 一轮运行的汇总
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub counts: RunCounts,
    pub records: Vec<JobRecord>,
}

impl RunSummary {
    pub fn from_records(records: Vec<JobRecord>) -> Self {
        let mut counts = RunCounts {
            total: records.len(),
            ..Default::default()
        };
        for record in &records {
            match record.outcome {
                JobOutcome::Success { .. } => counts.successful += 1,
                JobOutcome::Failure { .. } => counts.failed += 1,
                JobOutcome::Locked { .. } => counts.locked += 1,
                JobOutcome::Skipped { .. } => counts.skipped += 1,
            }
        }
        Self { counts, records }
    }

    /// 失败的文件及原因
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            JobOutcome::Failure { reason } => Some((&r.resource, reason.as_str())),
            _ => None,
        })
    }
}
