// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use crate::browser::{page_url, selector_present, selectors};
use crate::utils::errors::CaptchaError;

/// 求解等待上限
const SOLVE_TIMEOUT: Duration = Duration::from_secs(120);
/// 求解期间的轮询间隔
const SOLVE_POLL: Duration = Duration::from_secs(2);

/// 外部验证码求解能力
///
/// 默认实现点击复选框后轮询等待挑战消失（人工或浏览器侧
/// 插件完成求解）。接入打码服务时替换这一个特质实现即可。
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 驱动一次求解流程，挑战清除后返回
    async fn solve(&self, page: &Page) -> Result<(), CaptchaError>;
}

/// 判断页面当前是否落在挑战页上
pub async fn challenge_present(page: &Page) -> bool {
    if let Ok(url) = page_url(page).await {
        if url.contains("/sorry/") {
            return true;
        }
    }
    selector_present(page, selectors::RECAPTCHA_IFRAME).await
}

/// 轮询式默认求解器
pub struct PollingCaptchaSolver;

#[async_trait]
impl CaptchaSolver for PollingCaptchaSolver {
    async fn solve(&self, page: &Page) -> Result<(), CaptchaError> {
        info!("Captcha challenge detected, driving solve flow");

        // 复选框可能在iframe里点不到，失败不致命，继续等待清除
        if let Ok(checkbox) = page.find_element(selectors::RECAPTCHA_CHECKBOX).await {
            if let Err(e) = checkbox.click().await {
                debug!("Captcha checkbox click failed: {}", e);
            }
        }

        let deadline = tokio::time::Instant::now() + SOLVE_TIMEOUT;
        loop {
            tokio::time::sleep(SOLVE_POLL).await;
            if !challenge_present(page).await {
                info!("Captcha challenge cleared");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Captcha solve timed out");
                return Err(CaptchaError::Timeout);
            }
        }
    }
}
