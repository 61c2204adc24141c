//! Chromium 查询门户 - 基础设施层
//!
//! 每次 `open()` 得到一个独占的浏览器会话，引擎运行结束时关闭。

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, Page};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::browser::{self, LaunchOptions};
use crate::config::Config;
use crate::error::PortalError;
use crate::infrastructure::JsExecutor;
use crate::services::portal::{AttemptFault, PanelField, Portal, PortalSession, ResultPanel};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 页面元素定位
#[derive(Debug, Clone)]
pub struct PortalSelectors {
    /// 验证码画布（CSS）
    pub challenge_css: String,
    /// 验证码输入框（CSS）
    pub captcha_input_css: String,
    pub query_input_xpath: String,
    pub search_button_xpath: String,
    pub result_panel_xpath: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            challenge_css: "#canv".to_string(),
            captcha_input_css: "#captcha-input".to_string(),
            query_input_xpath: r#"//input[@placeholder="Masukkan Nomor Porsi"]"#.to_string(),
            search_button_xpath: r#"//*[@id="search-tabs"]/div[3]/div/div/div[1]/form/button"#
                .to_string(),
            result_panel_xpath: r#"//*[@id="search-tabs"]/div[3]/div/div[2]"#.to_string(),
        }
    }
}

/// 浏览器会话参数
#[derive(Debug, Clone)]
pub struct ChromePortalOptions {
    pub portal_url: String,
    pub page_load_timeout: Duration,
    pub element_wait: Duration,
    pub form_settle: Duration,
    pub browser_debug_port: Option<u16>,
    pub launch: LaunchOptions,
}

impl ChromePortalOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            portal_url: config.portal_url.clone(),
            page_load_timeout: config.page_load_timeout(),
            element_wait: config.element_wait(),
            form_settle: config.form_settle(),
            browser_debug_port: config.browser_debug_port,
            launch: LaunchOptions {
                chrome_executable: config.chrome_executable.clone(),
                headless: config.headless,
                request_timeout: config.page_load_timeout(),
            },
        }
    }
}

pub struct ChromePortal {
    options: ChromePortalOptions,
    selectors: PortalSelectors,
}

impl ChromePortal {
    pub fn new(options: ChromePortalOptions, selectors: PortalSelectors) -> Self {
        Self { options, selectors }
    }
}

#[async_trait]
impl Portal for ChromePortal {
    async fn open(&self) -> Result<Box<dyn PortalSession>, PortalError> {
        let (browser, handler, owned) = match self.options.browser_debug_port {
            Some(port) => {
                let (browser, handler) = browser::connect_to_browser(port).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) =
                    browser::launch_headless_browser(&self.options.launch).await?;
                (browser, handler, true)
            }
        };

        let mut session = ChromeSession {
            browser,
            handler,
            owned,
            page: None,
            options: self.options.clone(),
            selectors: self.selectors.clone(),
            closed: false,
        };

        if let Err(e) = session.load_entry_page().await {
            session.close().await;
            return Err(e);
        }

        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// 浏览器由本会话启动时为 true
    owned: bool,
    page: Option<Page>,
    options: ChromePortalOptions,
    selectors: PortalSelectors,
    closed: bool,
}

impl ChromeSession {
    async fn load_entry_page(&mut self) -> Result<(), PortalError> {
        let url = self.options.portal_url.clone();
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PortalError::PageCreationFailed {
                source: Box::new(e),
            })?;
        self.page = Some(page.clone());

        match timeout(self.options.page_load_timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(PortalError::NavigationFailed {
                    url,
                    source: Box::new(e),
                })
            }
            Err(_) => {
                return Err(PortalError::LoadTimeout {
                    url,
                    secs: self.options.page_load_timeout.as_secs(),
                })
            }
        }

        info!("已打开查询页面: {}", url);
        sleep(self.options.form_settle).await;
        Ok(())
    }

    fn page(&self) -> Result<&Page, AttemptFault> {
        self.page
            .as_ref()
            .ok_or_else(|| AttemptFault::Browser("会话页面不存在".to_string()))
    }

    async fn wait_for_css(&self, css: &str, limit: Duration) -> Result<Element, AttemptFault> {
        let page = self.page()?;
        timeout(limit, async {
            loop {
                if let Ok(element) = page.find_element(css).await {
                    return element;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| AttemptFault::timed_out(css, limit))
    }

    async fn wait_for_xpath(&self, xpath: &str, limit: Duration) -> Result<Element, AttemptFault> {
        let page = self.page()?;
        timeout(limit, async {
            loop {
                if let Ok(element) = page.find_xpath(xpath).await {
                    return element;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| AttemptFault::timed_out(xpath, limit))
    }
}

/// 清空输入框后逐字输入
async fn fill_input(element: &Element, text: &str) -> Result<(), AttemptFault> {
    element
        .call_js_fn("function() { this.value = ''; }", false)
        .await
        .map_err(browser_fault)?;
    element.click().await.map_err(browser_fault)?;
    element.type_str(text).await.map_err(browser_fault)?;
    Ok(())
}

fn browser_fault(e: chromiumoxide::error::CdpError) -> AttemptFault {
    AttemptFault::Browser(e.to_string())
}

#[async_trait]
impl PortalSession for ChromeSession {
    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, AttemptFault> {
        let canvas = self
            .wait_for_css(&self.selectors.challenge_css, self.options.element_wait)
            .await
            .map_err(|_| AttemptFault::ElementMissing(self.selectors.challenge_css.clone()))?;
        canvas.scroll_into_view().await.map_err(browser_fault)?;
        let png = canvas
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(browser_fault)?;
        debug!("验证码图片 {} 字节", png.len());
        Ok(png)
    }

    async fn submit(
        &mut self,
        guess: &str,
        query_key: &str,
        limit: Duration,
    ) -> Result<Box<dyn ResultPanel>, AttemptFault> {
        let page = self.page()?.clone();
        let selectors = &self.selectors;

        let captcha_input = page
            .find_element(selectors.captcha_input_css.as_str())
            .await
            .map_err(|_| AttemptFault::ElementMissing(selectors.captcha_input_css.clone()))?;
        fill_input(&captcha_input, guess).await?;

        let query_input = page
            .find_xpath(selectors.query_input_xpath.as_str())
            .await
            .map_err(|_| AttemptFault::ElementMissing(selectors.query_input_xpath.clone()))?;
        fill_input(&query_input, query_key).await?;

        sleep(self.options.form_settle).await;

        let button = page
            .find_xpath(selectors.search_button_xpath.as_str())
            .await
            .map_err(|_| AttemptFault::ElementMissing(selectors.search_button_xpath.clone()))?;
        button.click().await.map_err(browser_fault)?;

        self.wait_for_xpath(&selectors.result_panel_xpath, limit)
            .await
            .map_err(|_| AttemptFault::timed_out("结果面板", limit))?;
        sleep(self.options.form_settle).await;

        Ok(Box::new(ChromeResultPanel {
            executor: JsExecutor::new(page),
            panel_xpath: selectors.result_panel_xpath.clone(),
        }))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(page) = self.page.take() {
            if !self.owned {
                if let Err(e) = page.close().await {
                    warn!("关闭标签页失败: {}", e);
                }
            }
        }
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("等待浏览器退出失败: {}", e);
            }
        }
        self.handler.abort();
        debug!("浏览器会话已释放");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if !self.closed {
            // 未走 close() 的路径只能中止事件任务，浏览器进程由 Browser 自身回收
            self.handler.abort();
        }
    }
}

/// 浏览器中的结果面板
pub struct ChromeResultPanel {
    executor: JsExecutor,
    panel_xpath: String,
}

impl ChromeResultPanel {
    fn field_xpath(&self, field: PanelField) -> String {
        format!("{}/{}", self.panel_xpath, field.relative_xpath())
    }
}

#[async_trait]
impl ResultPanel for ChromeResultPanel {
    async fn screenshot(&self) -> Result<Vec<u8>, AttemptFault> {
        let panel = self
            .executor
            .page()
            .find_xpath(self.panel_xpath.as_str())
            .await
            .map_err(|_| AttemptFault::ElementMissing(self.panel_xpath.clone()))?;
        panel
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(browser_fault)
    }

    async fn text(&self, field: PanelField) -> Result<String, AttemptFault> {
        let xpath = self.field_xpath(field);
        match self.executor.xpath_text(&xpath).await {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(AttemptFault::ElementMissing(xpath)),
            Err(e) => Err(AttemptFault::Browser(e.to_string())),
        }
    }

    async fn fragments(&self, field: PanelField) -> Result<Vec<String>, AttemptFault> {
        let xpath = self.field_xpath(field);
        match self.executor.xpath_text_nodes(&xpath).await {
            Ok(Some(texts)) => Ok(texts),
            Ok(None) => Err(AttemptFault::ElementMissing(xpath)),
            Err(e) => Err(AttemptFault::Browser(e.to_string())),
        }
    }
}
