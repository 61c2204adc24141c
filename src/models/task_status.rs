use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{Job, JobStatus};
use super::record::ScrapedRecord;

/// 队列侧可见的任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Progress,
    Success,
    Failure,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

/// 成功任务的结果摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub record_id: Uuid,
    pub query_key: String,
    pub filename: String,
    pub screenshot_url: String,
    pub record: ScrapedRecord,
    pub attempts_used: u32,
}

/// pollStatus 的返回值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub progress: u8,
    pub status_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_used: Option<u32>,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            progress: 0,
            status_text: "任务等待处理".to_string(),
            result: None,
            error: None,
            attempts_used: None,
        }
    }

    pub fn progress(progress: u8, status_text: impl Into<String>) -> Self {
        Self {
            state: TaskState::Progress,
            progress,
            status_text: status_text.into(),
            result: None,
            error: None,
            attempts_used: None,
        }
    }

    pub fn success(result: TaskResult) -> Self {
        Self {
            state: TaskState::Success,
            progress: 100,
            status_text: "查询完成".to_string(),
            attempts_used: Some(result.attempts_used),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, attempts_used: u32) -> Self {
        Self {
            state: TaskState::Failure,
            progress: 100,
            status_text: "查询失败".to_string(),
            result: None,
            error: Some(error.into()),
            attempts_used: Some(attempts_used),
        }
    }
}

/// 由存储中的记录还原对外状态
impl From<&Job> for TaskStatus {
    fn from(job: &Job) -> Self {
        match job.status {
            JobStatus::Pending => TaskStatus::pending(),
            JobStatus::Running => TaskStatus::progress(0, "任务执行中"),
            JobStatus::Success => match (&job.record, &job.screenshot_filename) {
                (Some(record), Some(filename)) => TaskStatus::success(TaskResult {
                    record_id: job.id,
                    query_key: job.query_key.clone(),
                    filename: filename.clone(),
                    screenshot_url: job.screenshot_url.clone().unwrap_or_default(),
                    record: record.clone(),
                    attempts_used: job.attempts_used,
                }),
                _ => TaskStatus::failure("成功记录缺少结果数据", job.attempts_used),
            },
            JobStatus::Failure => TaskStatus::failure(
                job.error_message.clone().unwrap_or_default(),
                job.attempts_used,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_without_result() {
        let status = TaskStatus::failure("尝试次数已用完", 2);
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["state"], "FAILURE");
        assert_eq!(json["attempts_used"], 2);
        assert!(json.get("result").is_none());
        assert!(status.state.is_terminal());
    }
}
