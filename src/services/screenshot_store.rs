//! 截图存储服务 - 业务能力层
//!
//! 文件名规则：`result_<编号>_<时间戳>_<短 ID>.png`，只写一次，不覆盖。

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::error::ArtifactError;

/// 已保存的截图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredScreenshot {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
}

pub struct ScreenshotStore {
    folder: PathBuf,
    public_base_url: String,
}

impl ScreenshotStore {
    pub fn new(folder: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// 保存截图并返回文件引用
    pub async fn save(&self, query_key: &str, png: &[u8]) -> Result<StoredScreenshot, ArtifactError> {
        fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| ArtifactError::DirectoryCreateFailed {
                path: self.folder.display().to_string(),
                source: Box::new(e),
            })?;

        let filename = screenshot_filename(query_key);
        let path = self.folder.join(&filename);

        // create_new 保证不会覆盖已有文件
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    ArtifactError::AlreadyExists {
                        path: path.display().to_string(),
                    }
                } else {
                    ArtifactError::WriteFailed {
                        path: path.display().to_string(),
                        source: Box::new(e),
                    }
                }
            })?;

        let write_err = |e: std::io::Error| ArtifactError::WriteFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        };
        file.write_all(png).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        info!("📸 截图已保存: {}", path.display());

        Ok(StoredScreenshot {
            url: format!("{}/{}", self.public_base_url.trim_end_matches('/'), filename),
            filename,
            path,
        })
    }
}

/// 生成截图文件名
pub fn screenshot_filename(query_key: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let short_id = Uuid::new_v4().simple().to_string();
    format!("result_{}_{}_{}.png", sanitize(query_key), timestamp, &short_id[..8])
}

/// 编号中只保留可用于文件名的字符
fn sanitize(query_key: &str) -> String {
    query_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// 判断文件名是否符合截图命名规则
pub fn is_screenshot_filename(filename: &str, query_key: &str) -> bool {
    let Some(rest) = filename
        .strip_prefix(&format!("result_{}_", sanitize(query_key)))
        .and_then(|r| r.strip_suffix(".png"))
    else {
        return false;
    };
    // rest = YYYYmmdd_HHMMSS_xxxxxxxx
    let parts: Vec<&str> = rest.split('_').collect();
    parts.len() == 3
        && parts[0].len() == 8
        && parts[1].len() == 6
        && parts[2].len() == 8
        && parts[..2].iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
        && parts[2].chars().all(|c| c.is_ascii_hexdigit())
}
