//! 任务处理上下文
//!
//! 封装"我正在处理哪个任务的哪个编号"这一信息

use std::fmt::Display;

use crate::models::Job;

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 队列任务 ID
    pub job_id: String,

    /// 查询编号
    pub query_key: String,
}

impl JobCtx {
    pub fn new(job_id: impl Into<String>, query_key: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            query_key: query_key.into(),
        }
    }
}

impl From<&Job> for JobCtx {
    fn from(job: &Job) -> Self {
        Self::new(job.job_id.clone(), job.query_key.clone())
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {} 编号 {}]", self.job_id, self.query_key)
    }
}
