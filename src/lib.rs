//! # Porsi Lookup
//!
//! 通过带验证码的公共查询页面，按编号查询登记信息的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接 Chromium
//! - `infrastructure/` - 持有稀缺资源（Browser、Page），只暴露能力
//! - `ChromePortal` - 每次运行一个独占会话
//! - `JsExecutor` - 在页面中按 XPath 读取文本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `CaptchaSolver` - 验证码识别（tesseract）
//! - `FieldExtractor` - 从结果面板提取字段
//! - `RecordStore` - 任务记录与审计历史
//! - `ScreenshotStore` - 结果截图落盘
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次查询"的完整尝试流程
//! - `JobCtx` - 上下文封装（job_id + query_key）
//! - `ScrapeEngine` - 有限次数的 取验证码 → 识别 → 提交 → 提取
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_queue` - 任务队列，管理并发
//! - `orchestrator/task_coordinator` - 单个任务的生命周期、进度与重试
//! - `orchestrator/app` - 组装与批量入口
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Job, JobStatus, Outcome, ScrapedRecord, TaskState, TaskStatus};
pub use orchestrator::{App, JobQueue, TaskCoordinator};
pub use workflow::{JobCtx, ScrapeEngine};
