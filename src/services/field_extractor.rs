//! 字段提取服务 - 业务能力层
//!
//! 从结果面板读出七个字段，每个字段单独读取，互不影响。

use tracing::{debug, warn};

use crate::models::ScrapedRecord;
use crate::services::portal::{AttemptFault, PanelField, ResultPanel};

/// 字段提取器
///
/// 单个字段失败只记录日志并置空，不中断其它字段，也不重试。
#[derive(Debug, Default, Clone)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract(&self, panel: &dyn ResultPanel, query_key: &str) -> ScrapedRecord {
        let mut record = ScrapedRecord::empty(query_key);

        for field in PanelField::ALL {
            let value = match self.read_field(panel, field).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("读取字段 {} 失败: {}", field.label(), e);
                    None
                }
            };
            debug!("字段 {}: {:?}", field.label(), value);

            let slot = match field {
                PanelField::Name => &mut record.name,
                PanelField::Regency => &mut record.regency,
                PanelField::Province => &mut record.province,
                PanelField::Quota => &mut record.quota,
                PanelField::PaymentStatus => &mut record.payment_status,
                PanelField::DepartureEstimate => &mut record.departure_estimate,
                PanelField::RequestTime => &mut record.request_time,
            };
            *slot = value;
        }

        let missing = record.missing_fields();
        if missing > 0 {
            warn!("编号 {} 的结果有 {} 个字段为空", query_key, missing);
        }

        record
    }

    async fn read_field(
        &self,
        panel: &dyn ResultPanel,
        field: PanelField,
    ) -> Result<Option<String>, AttemptFault> {
        match field {
            PanelField::DepartureEstimate => {
                let fragments = panel.fragments(field).await?;
                Ok(join_fragments(&fragments))
            }
            _ => {
                let text = panel.text(field).await?;
                Ok(non_empty(text.trim()))
            }
        }
    }
}

/// 去掉空片段后以空格拼接；没有片段时为 None
fn join_fragments(fragments: &[String]) -> Option<String> {
    let joined = fragments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    non_empty(joined.trim())
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
