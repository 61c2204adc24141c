//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务调度与生命周期，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 组装各层组件
//! - 批量入队并汇总结果
//!
//! ### `job_queue` - 任务队列
//! - 校验查询编号、创建 Pending 记录
//! - 控制并发数量（Semaphore）
//! - 返回任务对外状态
//!
//! ### `task_coordinator` - 任务生命周期协调器
//! - Pending → Running → Success / Failure
//! - 进度上报、结果落库、基础设施重试
//!
//! ### `status_board` - 任务状态板
//!
//! ## 层次关系
//!
//! ```text
//! app (处理一组查询编号)
//!     ↓
//! job_queue (调度 Vec<Job>)
//!     ↓
//! task_coordinator (处理单个 Job 的生命周期)
//!     ↓
//! workflow::ScrapeEngine (有限次数的查询尝试)
//!     ↓
//! services (能力层：识别 / 提取 / 存储)
//!     ↓
//! infrastructure (基础设施：ChromePortal / JsExecutor)
//! ```

pub mod app;
pub mod job_queue;
pub mod status_board;
pub mod task_coordinator;

// 重新导出主要类型
pub use app::{cleanup_old_results, App, QueryRecords, QueryReport};
pub use job_queue::{validate_query_key, JobQueue};
pub use status_board::{ProgressReporter, StatusBoard};
pub use task_coordinator::{CoordinatorSettings, TaskCoordinator};
