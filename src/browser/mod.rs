// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::settings::BrowserSettings;
use crate::utils::errors::BrowserError;

pub mod captcha_solver;
pub mod fields;
pub mod images;
pub mod reviews;
pub mod search;
pub mod selectors;

/// 元素轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 页面身份档案
///
/// 两个工作器池共享一个浏览器进程，但使用不同的UA档案
/// 降低指纹关联度。发现页与详情页各用一套。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProfile {
    /// 链接发现（搜索页）
    Discovery,
    /// 详情提取（列表详情页）
    Extraction,
}

impl PageProfile {
    fn user_agent(&self) -> &'static str {
        match self {
            PageProfile::Discovery => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36"
            }
            PageProfile::Extraction => {
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36"
            }
        }
    }

    fn accept_language(&self) -> Option<&'static str> {
        match self {
            PageProfile::Discovery => None,
            PageProfile::Extraction => Some("en-US,en;q=0.9"),
        }
    }
}

/// 浏览器会话
///
/// 一个任务运行持有一个浏览器进程，两个工作器池共享。
/// 无论任务成功或失败，编排器在收尾阶段统一关闭。
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// 启动或连接浏览器
    ///
    /// 配置了远程调试地址时连接既有实例，否则本地启动
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let (browser, mut handler) = if let Some(url) = &settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url)
                .await
                .map_err(|e| BrowserError::Launch(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(Duration::from_secs(settings.request_timeout_secs));
            if !settings.headless {
                builder = builder.with_head();
            }
            builder = builder.arg("--disable-gpu").arg("--disable-dev-shm-usage");

            let config = builder
                .build()
                .map_err(BrowserError::Launch)?;
            Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Browser session ready");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// 按身份档案打开新页面
    pub async fn new_page(&self, profile: PageProfile) -> Result<Page, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page(format!("Failed to open page: {}", e)))?;

        page.set_user_agent(override_params(profile))
            .await
            .map_err(|e| BrowserError::Page(format!("Failed to set user agent: {}", e)))?;

        Ok(page)
    }

    /// 关闭浏览器进程
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        self.handler_task.abort();
        info!("Browser session closed");
    }
}

/// 轮询等待选择器出现
///
/// 超时返回 `BrowserError::Timeout`，调用方决定是硬失败还是降级
pub async fn wait_for_selector(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, BrowserError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BrowserError::Timeout(format!(
                "等待选择器超时: {}",
                selector
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// 检查选择器当前是否存在，不等待
pub async fn selector_present(page: &Page, selector: &str) -> bool {
    page.find_element(selector).await.is_ok()
}

/// 读取页面当前URL
pub async fn page_url(page: &Page) -> Result<String, BrowserError> {
    page.url()
        .await
        .map_err(|e| BrowserError::Page(format!("Failed to read page URL: {}", e)))?
        .ok_or_else(|| BrowserError::Page("页面没有URL".to_string()))
}

/// 按身份档案构造UA覆盖参数，`Page::set_user_agent` 的入参类型
fn override_params(profile: PageProfile) -> SetUserAgentOverrideParams {
    let mut params = SetUserAgentOverrideParams::new(profile.user_agent());
    if let Some(lang) = profile.accept_language() {
        params.accept_language = Some(lang.to_string());
    }
    params
}

/// 滚动容器直到高度稳定
///
/// 反复把容器滚到底并读取 scrollHeight，连续 `stable_polls` 次
/// 不再增长或达到迭代上限时停止。容器不存在视为无事可做。
pub async fn scroll_until_stable(
    page: &Page,
    container_selector: &str,
    max_iterations: usize,
    stable_polls: usize,
    poll_delay: Duration,
) -> Result<(), BrowserError> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector('{}');
            if (!el) return -1;
            el.scrollTop = el.scrollHeight;
            return el.scrollHeight;
        }})()"#,
        container_selector.replace('\'', "\\'")
    );

    let mut last_height: i64 = -1;
    let mut stable = 0usize;
    for _ in 0..max_iterations {
        let height: i64 = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        if height < 0 {
            debug!(selector = %container_selector, "Scroll container not found");
            return Ok(());
        }
        if height == last_height {
            stable += 1;
            if stable >= stable_polls {
                break;
            }
        } else {
            stable = 0;
            last_height = height;
        }
        tokio::time::sleep(poll_delay).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_build_distinct_override_params() {
        let discovery = override_params(PageProfile::Discovery);
        let extraction = override_params(PageProfile::Extraction);

        assert_ne!(discovery.user_agent, extraction.user_agent);
        assert!(discovery.accept_language.is_none());
        assert_eq!(extraction.accept_language.as_deref(), Some("en-US,en;q=0.9"));
    }
}
