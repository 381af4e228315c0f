// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{selectors, wait_for_selector};
use crate::domain::models::listing::Review;
use crate::utils::errors::BrowserError;

/// 评论列表的数量稳定检测参数
const SCROLL_MAX_ITERATIONS: usize = 40;
const SCROLL_STABLE_POLLS: usize = 3;
const SCROLL_POLL_DELAY: Duration = Duration::from_millis(800);
const TAB_TIMEOUT: Duration = Duration::from_secs(10);

/// 星级aria-label里的首个数字，如 "4 stars" → 4
static STARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("stars pattern is valid"));

/// 提取评论列表
///
/// 切到评论视图，尽力按最新排序，滚动直到评论数量不再增长
/// 或达到 max_reviews 上限，展开被截断的内容后逐条解析。
/// 结束后切回概览视图，失败不影响已解析的评论。
pub async fn extract_reviews(page: &Page, max_reviews: usize) -> Result<Vec<Review>, BrowserError> {
    let tab = wait_for_selector(page, selectors::REVIEWS_TAB, TAB_TIMEOUT).await?;
    tab.click()
        .await
        .map_err(|e| BrowserError::Page(format!("Failed to switch to reviews view: {}", e)))?;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    sort_newest_first(page).await;
    scroll_reviews(page, max_reviews).await?;
    expand_truncated(page).await;

    let blocks = page
        .find_elements(selectors::REVIEW_BLOCK)
        .await
        .unwrap_or_default();
    let mut reviews = Vec::with_capacity(blocks.len().min(max_reviews));
    for block in blocks.iter().take(max_reviews) {
        let reviewer = child_text(block, selectors::REVIEW_AUTHOR).await;
        let rating = match child_attribute(block, selectors::REVIEW_STARS, "aria-label").await {
            Some(label) => parse_star_rating(&label),
            None => String::new(),
        };
        let date = child_text(block, selectors::REVIEW_DATE).await;
        let content = child_text(block, selectors::REVIEW_CONTENT).await;
        if reviewer.is_empty() && content.is_empty() {
            continue;
        }
        reviews.push(Review {
            reviewer,
            rating,
            date,
            content,
        });
    }

    back_to_overview(page).await;
    debug!(count = reviews.len(), "Reviews extracted");
    Ok(reviews)
}

/// 尽力按最新排序，菜单不可用时保持默认排序
async fn sort_newest_first(page: &Page) {
    let result: Result<(), BrowserError> = async {
        let button = page
            .find_element(selectors::REVIEW_SORT_BUTTON)
            .await
            .map_err(|_| BrowserError::Page("排序按钮未找到".to_string()))?;
        button
            .click()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        page.find_element(selectors::REVIEW_SORT_NEWEST)
            .await
            .map_err(|_| BrowserError::Page("排序菜单项未找到".to_string()))?
            .click()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        tokio::time::sleep(Duration::from_millis(1000)).await;
        Ok(())
    }
    .await;
    if let Err(e) = result {
        warn!("Newest-first sort unavailable, using default order: {}", e);
    }
}

/// 按评论数量稳定检测滚动
///
/// 与高度检测不同，这里以可见评论块数量为准，
/// 达到 max_reviews 立刻停止
async fn scroll_reviews(page: &Page, max_reviews: usize) -> Result<(), BrowserError> {
    let scroll_script = format!(
        r#"(() => {{
            const el = document.querySelector('{}');
            if (el) el.scrollTop = el.scrollHeight;
        }})()"#,
        selectors::REVIEW_SCROLL_PANE.replace('\'', "\\'")
    );

    let mut last_count = 0usize;
    let mut stable = 0usize;
    for _ in 0..SCROLL_MAX_ITERATIONS {
        let count = page
            .find_elements(selectors::REVIEW_BLOCK)
            .await
            .map(|els| els.len())
            .unwrap_or(0);
        if count >= max_reviews {
            break;
        }
        if count == last_count {
            stable += 1;
            if stable >= SCROLL_STABLE_POLLS {
                break;
            }
        } else {
            stable = 0;
            last_count = count;
        }
        page.evaluate(scroll_script.as_str())
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        tokio::time::sleep(SCROLL_POLL_DELAY).await;
    }
    Ok(())
}

/// 展开所有"查看更多"截断控件，单个失败忽略
async fn expand_truncated(page: &Page) {
    let buttons = page
        .find_elements(selectors::REVIEW_SEE_MORE)
        .await
        .unwrap_or_default();
    for button in buttons {
        let _ = button.click().await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn back_to_overview(page: &Page) {
    if let Ok(tab) = page.find_element(selectors::MAIN_TAB).await {
        if tab.click().await.is_err() {
            warn!("Failed to switch back to overview tab");
        }
        tokio::time::sleep(Duration::from_millis(800)).await;
    }
}

/// "4 stars" → "4/5"
fn parse_star_rating(label: &str) -> String {
    match STARS_RE.captures(label).and_then(|c| c.get(1)) {
        Some(m) => format!("{}/5", m.as_str()),
        None => String::new(),
    }
}

async fn child_text(element: &chromiumoxide::Element, selector: &str) -> String {
    match element.find_element(selector).await {
        Ok(child) => child
            .inner_text()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
            .trim()
            .to_string(),
        Err(_) => String::new(),
    }
}

async fn child_attribute(
    element: &chromiumoxide::Element,
    selector: &str,
    name: &str,
) -> Option<String> {
    element
        .find_element(selector)
        .await
        .ok()?
        .attribute(name)
        .await
        .ok()
        .flatten()
}
