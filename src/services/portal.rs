//! 查询门户 - 业务能力层
//!
//! 只描述"一个交互会话能做什么"，不关心如何渲染页面。
//! 浏览器实现见 `infrastructure::chrome_portal`。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PortalError;

/// 单次尝试内的故障
///
/// 只在引擎内部流转，决定日志内容，不影响次数计算。
#[derive(Debug, Error)]
pub enum AttemptFault {
    #[error("验证码识别结果不可用: '{guess}'")]
    CaptchaIllegible { guess: String },

    #[error("页面元素不存在: {0}")]
    ElementMissing(String),

    #[error("等待 {what} 超时 ({secs} 秒)")]
    TimedOut { what: String, secs: u64 },

    #[error("浏览器操作失败: {0}")]
    Browser(String),
}

impl AttemptFault {
    pub fn timed_out(what: impl Into<String>, timeout: Duration) -> Self {
        AttemptFault::TimedOut {
            what: what.into(),
            secs: timeout.as_secs(),
        }
    }
}

/// 结果面板中的字段位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelField {
    Name,
    Regency,
    Province,
    Quota,
    PaymentStatus,
    /// 多个文本片段拼接而成
    DepartureEstimate,
    RequestTime,
}

impl PanelField {
    pub const ALL: [PanelField; 7] = [
        PanelField::Name,
        PanelField::Regency,
        PanelField::Province,
        PanelField::Quota,
        PanelField::PaymentStatus,
        PanelField::DepartureEstimate,
        PanelField::RequestTime,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PanelField::Name => "姓名",
            PanelField::Regency => "县/市",
            PanelField::Province => "省份",
            PanelField::Quota => "配额",
            PanelField::PaymentStatus => "缴费状态",
            PanelField::DepartureEstimate => "预计出发",
            PanelField::RequestTime => "查询时间",
        }
    }

    /// 相对于结果面板的 XPath
    pub fn relative_xpath(&self) -> &'static str {
        match self {
            PanelField::Name => "div[1]/p[1]",
            PanelField::Regency => "div[1]/p[2]",
            PanelField::Province => "div[2]/p[1]",
            PanelField::Quota => "div[2]/p[2]",
            PanelField::PaymentStatus => "div[3]/p[1]",
            PanelField::DepartureEstimate => "div[3]",
            PanelField::RequestTime => "div[3]/p[2]",
        }
    }
}

/// 已出现的结果面板
#[async_trait]
pub trait ResultPanel: Send + Sync {
    /// 面板截图（PNG）
    async fn screenshot(&self) -> Result<Vec<u8>, AttemptFault>;

    /// 读取字段文本
    async fn text(&self, field: PanelField) -> Result<String, AttemptFault>;

    /// 读取字段节点下的直接文本片段
    async fn fragments(&self, field: PanelField) -> Result<Vec<String>, AttemptFault>;
}

/// 一个交互会话，只属于一次引擎运行
#[async_trait]
pub trait PortalSession: Send {
    /// 获取验证码图片
    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, AttemptFault>;

    /// 填写验证码与查询编号并提交，在 `timeout` 内等待结果面板
    async fn submit(
        &mut self,
        guess: &str,
        query_key: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ResultPanel>, AttemptFault>;

    /// 释放会话，任何退出路径都必须调用
    async fn close(&mut self);
}

/// 会话工厂
#[async_trait]
pub trait Portal: Send + Sync {
    /// 打开入口页面；失败属于基础设施故障
    async fn open(&self) -> Result<Box<dyn PortalSession>, PortalError>;
}
