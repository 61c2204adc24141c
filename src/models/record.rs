use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 结果面板中提取的字段
///
/// 七个字段各自独立，任意子集为空都不算错误。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub query_key: String,
    pub name: Option<String>,
    pub regency: Option<String>,
    pub province: Option<String>,
    pub quota: Option<String>,
    pub payment_status: Option<String>,
    pub departure_estimate: Option<String>,
    pub request_time: Option<String>,
}

impl ScrapedRecord {
    pub fn empty(query_key: impl Into<String>) -> Self {
        Self {
            query_key: query_key.into(),
            ..Default::default()
        }
    }

    /// 为空的字段数量
    pub fn missing_fields(&self) -> usize {
        [
            &self.name,
            &self.regency,
            &self.province,
            &self.quota,
            &self.payment_status,
            &self.departure_estimate,
            &self.request_time,
        ]
        .iter()
        .filter(|v| v.is_none())
        .count()
    }
}

/// 成功结果的审计副本，只追加不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub record: ScrapedRecord,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(record: ScrapedRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_counts_nulls() {
        let mut record = ScrapedRecord::empty("3000123456");
        assert_eq!(record.missing_fields(), 7);

        record.name = Some("SITI AMINAH".to_string());
        record.province = Some("JAWA TIMUR".to_string());
        assert_eq!(record.missing_fields(), 5);
    }
}
