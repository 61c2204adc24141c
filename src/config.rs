use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};

/// 程序配置
///
/// 所有组件通过构造函数接收配置值，不存在全局可变状态。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 查询页面入口
    pub portal_url: String,
    /// 单个任务最多尝试的验证码次数
    pub max_attempts: u32,
    /// 每次提交后等待结果面板的秒数
    pub per_attempt_timeout_secs: u64,
    /// 入口页面加载超时（秒）
    pub page_load_timeout_secs: u64,
    /// 等待验证码等表单元素出现的秒数
    pub element_wait_secs: u64,
    /// 验证码识别结果的最小长度
    pub min_captcha_len: usize,
    /// 两次尝试之间的停顿（毫秒）
    pub retry_pause_ms: u64,
    /// 填表与结果出现后的稳定等待（毫秒）
    pub form_settle_ms: u64,
    /// tesseract 可执行文件
    pub tesseract_cmd: String,
    /// 截图保存目录
    pub screenshot_folder: String,
    /// 截图对外访问前缀
    pub public_base_url: String,
    /// 基础设施故障的整体重试次数
    pub infra_max_retries: u32,
    /// 基础设施重试间隔（秒）
    pub infra_retry_delay_secs: u64,
    /// 同时执行的任务数量
    pub worker_pool_size: usize,
    /// 浏览器调试端口，设置后连接已有浏览器而不是启动新的
    pub browser_debug_port: Option<u16>,
    /// 自定义浏览器可执行文件
    pub chrome_executable: Option<String>,
    /// 是否无头模式
    pub headless: bool,
    /// 记录快照文件，为空时只保存在内存
    pub record_store_path: Option<String>,
    /// 历史查询默认条数
    pub history_limit: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_url: "https://haji.kemenag.go.id/v5/?search=estimation".to_string(),
            max_attempts: 5,
            per_attempt_timeout_secs: 15,
            page_load_timeout_secs: 30,
            element_wait_secs: 15,
            min_captcha_len: 3,
            retry_pause_ms: 2000,
            form_settle_ms: 2000,
            tesseract_cmd: "tesseract".to_string(),
            screenshot_folder: "result_screenshots".to_string(),
            public_base_url: "http://localhost:8000/files".to_string(),
            infra_max_retries: 3,
            infra_retry_delay_secs: 60,
            worker_pool_size: 2,
            browser_debug_port: None,
            chrome_executable: None,
            headless: true,
            record_store_path: Some("records.json".to_string()),
            history_limit: 10,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 读取配置：可选的 TOML 文件（`CONFIG_FILE`），再叠加环境变量，最后校验
    pub fn load() -> AppResult<Self> {
        let config = match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?.with_env_overrides(),
            Err(_) => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// 默认值叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失的键使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::FileParseFailed { source, .. }) => {
                AppError::Config(ConfigError::FileParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| {
            AppError::Config(ConfigError::FileParseFailed {
                path: String::new(),
                source: Box::new(e),
            })
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            portal_url: env_or("PORTAL_URL", self.portal_url),
            max_attempts: env_parse_or("MAX_ATTEMPTS", self.max_attempts),
            per_attempt_timeout_secs: env_parse_or("PER_ATTEMPT_TIMEOUT", self.per_attempt_timeout_secs),
            page_load_timeout_secs: env_parse_or("PAGE_LOAD_TIMEOUT", self.page_load_timeout_secs),
            element_wait_secs: env_parse_or("ELEMENT_WAIT_TIMEOUT", self.element_wait_secs),
            min_captcha_len: env_parse_or("MIN_CAPTCHA_LEN", self.min_captcha_len),
            retry_pause_ms: env_parse_or("RETRY_PAUSE_MS", self.retry_pause_ms),
            form_settle_ms: env_parse_or("FORM_SETTLE_MS", self.form_settle_ms),
            tesseract_cmd: env_or("TESSERACT_CMD", self.tesseract_cmd),
            screenshot_folder: env_or("SCREENSHOT_FOLDER", self.screenshot_folder),
            public_base_url: env_or("PUBLIC_BASE_URL", self.public_base_url),
            infra_max_retries: env_parse_or("INFRA_MAX_RETRIES", self.infra_max_retries),
            infra_retry_delay_secs: env_parse_or("INFRA_RETRY_DELAY", self.infra_retry_delay_secs),
            worker_pool_size: env_parse_or("WORKER_POOL_SIZE", self.worker_pool_size),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(self.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(self.chrome_executable),
            headless: env_parse_or("HEADLESS", self.headless),
            record_store_path: std::env::var("RECORD_STORE_PATH").ok().or(self.record_store_path),
            history_limit: env_parse_or("HISTORY_LIMIT", self.history_limit),
            verbose_logging: env_parse_or("VERBOSE_LOGGING", self.verbose_logging),
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("max_attempts", self.max_attempts as u64),
            ("per_attempt_timeout_secs", self.per_attempt_timeout_secs),
            ("page_load_timeout_secs", self.page_load_timeout_secs),
            ("element_wait_secs", self.element_wait_secs),
            ("min_captcha_len", self.min_captcha_len as u64),
            ("worker_pool_size", self.worker_pool_size as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::Config(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    expected: "正整数".to_string(),
                }));
            }
        }
        Ok(())
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.per_attempt_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn form_settle(&self) -> Duration {
        Duration::from_millis(self.form_settle_ms)
    }

    pub fn infra_retry_delay(&self) -> Duration {
        Duration::from_secs(self.infra_retry_delay_secs)
    }
}

fn env_or(name: &str, fallback: String) -> String {
    std::env::var(name).unwrap_or(fallback)
}

fn env_parse_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.min_captcha_len, 3);
    }

    #[test]
    fn test_toml_missing_keys_fall_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            max_attempts = 7
            screenshot_folder = "shots"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.screenshot_folder, "shots");
        assert_eq!(config.per_attempt_timeout_secs, 15);
        assert_eq!(config.infra_max_retries, 3);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_bad_toml_reports_parse_error() {
        let err = Config::from_toml_str("max_attempts = \"many\"").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::FileParseFailed { .. })
        ));
    }
}
