//! 验证码识别服务 - 业务能力层
//!
//! 只负责"把图片猜成文字"，正确与否由提交结果决定。

use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 验证码识别
///
/// 识别失败返回空串或短串，不返回错误。
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> String;
}

/// 基于 tesseract 命令行的识别器
///
/// 按单行、短、带噪声的字母数字串调参（`--psm 7`），不使用词典。
pub struct TesseractSolver {
    tesseract_cmd: String,
    /// 识别结果中的非字母数字字符
    noise: Regex,
}

impl TesseractSolver {
    pub fn new(tesseract_cmd: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            tesseract_cmd: tesseract_cmd.into(),
            noise: Regex::new(r"[^A-Za-z0-9]")?,
        })
    }

    /// 去掉识别结果中的空白与标点
    pub fn normalize_guess(&self, raw: &str) -> String {
        self.noise.replace_all(raw.trim(), "").into_owned()
    }

    async fn run_tesseract(&self, image: &[u8]) -> std::io::Result<String> {
        let mut child = Command::new(&self.tesseract_cmd)
            .args(["stdin", "stdout", "-l", "eng", "--oem", "3", "--psm", "7"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await?;
            // 关闭 stdin，tesseract 才会开始识别
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "tesseract 退出码 {:?}",
                output.status.code()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CaptchaSolver for TesseractSolver {
    async fn solve(&self, image: &[u8]) -> String {
        match self.run_tesseract(image).await {
            Ok(raw) => {
                let text = self.normalize_guess(&raw);
                debug!("OCR 原始输出: {:?} -> {:?}", raw.trim(), text);
                text
            }
            Err(e) => {
                warn!("调用 tesseract 失败: {}", e);
                String::new()
            }
        }
    }
}

/// 识别结果是否值得提交
pub fn is_plausible(guess: &str, min_len: usize) -> bool {
    !guess.is_empty() && guess.chars().count() >= min_len
}
