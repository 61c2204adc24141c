use std::path::Path;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::PortalError;

/// 无头浏览器启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_executable: Option<String>,
    pub headless: bool,
    pub request_timeout: Duration,
}

/// 启动浏览器，返回浏览器与事件处理任务
pub async fn launch_headless_browser(
    options: &LaunchOptions,
) -> Result<(Browser, JoinHandle<()>), PortalError> {
    info!("🚀 启动浏览器 (headless: {})...", options.headless);

    let mut builder = BrowserConfig::builder()
        .window_size(1920, 1080)
        .request_timeout(options.request_timeout)
        .args(vec![
            "--no-sandbox",                                  // 容器内运行需要
            "--disable-dev-shm-usage",                       // 防止共享内存不足
            "--disable-gpu",
            "--disable-extensions",
            "--disable-blink-features=AutomationControlled",
        ]);
    if options.headless {
        builder = builder.new_headless_mode();
    } else {
        builder = builder.with_head();
    }
    if let Some(executable) = &options.chrome_executable {
        builder = builder.chrome_executable(Path::new(executable));
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        PortalError::LaunchFailed {
            source: e.into(),
        }
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        PortalError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}
