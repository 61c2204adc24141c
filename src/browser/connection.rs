use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::PortalError;

/// 连接到已开启远程调试端口的浏览器
///
/// 会话只使用自己新建的标签页，关闭时不会关闭浏览器本身。
pub async fn connect_to_browser(port: u16) -> Result<(Browser, JoinHandle<()>), PortalError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        PortalError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("浏览器连接成功");

    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok((browser, handler_task))
}
