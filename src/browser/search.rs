// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use crate::browser::captcha_solver::{challenge_present, CaptchaSolver};
use crate::browser::{page_url, selector_present, selectors};
use crate::pipeline::captcha::CaptchaCoordinator;

/// 求解失败后的冷却时间，之后重试一次
const SOLVE_COOLDOWN: Duration = Duration::from_secs(30);
/// 结果面板滚动参数
const SCROLL_MAX_ITERATIONS: usize = 50;
const SCROLL_STABLE_POLLS: usize = 3;
const SCROLL_POLL_DELAY: Duration = Duration::from_millis(700);
/// 分类轮询间隔
const CLASSIFY_POLL: Duration = Duration::from_millis(250);

/// 搜索落地页的分类结果
enum LandingPage {
    /// 搜索直接解析到单个列表
    Single,
    /// 出现结果面板
    List,
    /// 两种标志都没等到
    Timeout,
}

/// 执行一次地图搜索并收集候选链接
///
/// 导航到搜索URL，处理共享挑战，分类落地页：
/// 单结果返回当前URL，列表页先应用评分过滤再滚动穷尽
/// 懒加载结果后收集全部href，超时返回空集（调用方不视为错误）。
pub async fn search_listings(
    page: &Page,
    coordinator: &CaptchaCoordinator,
    solver: &dyn CaptchaSolver,
    query: &str,
    rating_filter: Option<&str>,
    nav_timeout: Duration,
) -> Result<Vec<String>> {
    let search_url = format!(
        "https://www.google.com/maps/search/{}",
        urlencoding::encode(query)
    );
    navigate(page, &search_url, nav_timeout).await?;

    if challenge_present(page).await {
        handle_shared_challenge(page, coordinator, solver, &search_url, nav_timeout).await?;
    }

    match classify_landing(page, nav_timeout).await {
        LandingPage::Single => {
            let url = page_url(page).await?;
            info!(query = %query, "Search resolved directly to a single listing");
            Ok(vec![url])
        }
        LandingPage::List => {
            if let Some(bucket) = rating_filter {
                apply_rating_filter(page, bucket).await;
            }
            crate::browser::scroll_until_stable(
                page,
                selectors::RESULT_FEED,
                SCROLL_MAX_ITERATIONS,
                SCROLL_STABLE_POLLS,
                SCROLL_POLL_DELAY,
            )
            .await?;
            let links = collect_result_links(page).await?;
            info!(query = %query, links = links.len(), "Search results collected");
            Ok(links)
        }
        LandingPage::Timeout => {
            warn!(query = %query, "Neither result indicator appeared, skipping unit");
            Ok(Vec::new())
        }
    }
}

async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, page.goto(url))
        .await
        .map_err(|_| anyhow::anyhow!("navigation timed out: {}", url))?
        .with_context(|| format!("navigation failed: {}", url))?;
    Ok(())
}

/// 处理搜索页上的共享挑战
///
/// 赢得租约的一方驱动求解（失败后冷却重试一次），
/// 其余等待放行后重试导航。求解最终失败对本次搜索是致命的，
/// 由单元级重试接手。
async fn handle_shared_challenge(
    page: &Page,
    coordinator: &CaptchaCoordinator,
    solver: &dyn CaptchaSolver,
    search_url: &str,
    nav_timeout: Duration,
) -> Result<()> {
    if coordinator.claim_handling() {
        let mut outcome = solver.solve(page).await;
        if outcome.is_err() {
            warn!("Captcha solve failed, cooling down before one retry");
            tokio::time::sleep(SOLVE_COOLDOWN).await;
            navigate(page, search_url, nav_timeout).await?;
            outcome = solver.solve(page).await;
        }
        let success = outcome.is_ok();
        coordinator.resolve_handling(success);
        if let Err(e) = outcome {
            bail!("captcha solve failed after retry: {}", e);
        }
        // 求解发生在挑战页上，回到本来要去的搜索页
        navigate(page, search_url, nav_timeout).await?;
    } else {
        coordinator
            .wait_for_green_light()
            .await
            .map_err(|e| anyhow::anyhow!("challenge resolved elsewhere: {}", e))?;
        navigate(page, search_url, nav_timeout).await?;
    }
    Ok(())
}

/// 轮询分类落地页，列表面板优先于单结果标题
async fn classify_landing(page: &Page, timeout: Duration) -> LandingPage {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if selector_present(page, selectors::RESULT_FEED).await {
            return LandingPage::List;
        }
        if selector_present(page, selectors::SINGLE_RESULT_TITLE).await {
            return LandingPage::Single;
        }
        if tokio::time::Instant::now() >= deadline {
            return LandingPage::Timeout;
        }
        tokio::time::sleep(CLASSIFY_POLL).await;
    }
}

/// 人类档位到站点过滤菜单 data-index 的映射
fn rating_filter_index(bucket: &str) -> Option<&'static str> {
    match bucket {
        "4.5+" => Some("6"),
        "4" | "4+" => Some("5"),
        "3.5" | "3.5+" => Some("4"),
        "3" | "3+" => Some("3"),
        "2.5" | "2.5+" => Some("2"),
        "2" | "2+" => Some("1"),
        _ => None,
    }
}

/// 应用评分过滤，任何一步失败都只降级为不过滤
async fn apply_rating_filter(page: &Page, bucket: &str) {
    let Some(index) = rating_filter_index(bucket) else {
        warn!(bucket = %bucket, "Unknown rating bucket, filter skipped");
        return;
    };
    let result: Result<()> = async {
        page.find_element(selectors::RATING_FILTER_BUTTON)
            .await
            .context("rating filter button not found")?
            .click()
            .await
            .context("rating filter button click failed")?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        page.find_element(selectors::rating_menu_item(index).as_str())
            .await
            .context("rating menu item not found")?
            .click()
            .await
            .context("rating menu item click failed")?;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Ok(())
    }
    .await;
    if let Err(e) = result {
        warn!(bucket = %bucket, "Rating filter failed, continuing unfiltered: {}", e);
    } else {
        debug!(bucket = %bucket, "Rating filter applied");
    }
}

async fn collect_result_links(page: &Page) -> Result<Vec<String>> {
    let elements = page
        .find_elements(selectors::RESULT_LINK)
        .await
        .unwrap_or_default();
    let mut links = Vec::with_capacity(elements.len());
    for element in elements {
        if let Ok(Some(href)) = element.attribute("href").await {
            // 相对或畸形的href不进队列
            if url::Url::parse(&href).is_ok() {
                links.push(href);
            }
        }
    }
    Ok(links)
}
