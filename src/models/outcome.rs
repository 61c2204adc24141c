use super::record::ScrapedRecord;

/// 查询引擎的最终结果
///
/// 只在引擎与协调器之间传递，不直接持久化。
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 结果面板出现
    Success {
        record: ScrapedRecord,
        screenshot: Vec<u8>,
        attempts_used: u32,
    },
    /// 尝试次数用完仍未出现结果面板
    BudgetExhausted { reason: String, attempts_used: u32 },
    /// 会话无法建立
    InfraFault { reason: String },
}

impl Outcome {
    pub fn attempts_used(&self) -> u32 {
        match self {
            Outcome::Success { attempts_used, .. }
            | Outcome::BudgetExhausted { attempts_used, .. } => *attempts_used,
            Outcome::InfraFault { .. } => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
