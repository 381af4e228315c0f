// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{selector_present, selectors};
use crate::utils::errors::BrowserError;

/// 子提取整体重试次数（含页面重载）
const MAX_ATTEMPTS: usize = 3;
const GALLERY_SCROLL_ITERATIONS: usize = 20;
const GALLERY_SCROLL_STABLE: usize = 3;
const GALLERY_SCROLL_DELAY: Duration = Duration::from_millis(600);

/// 瓦片style里的background-image URL
static BG_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(["']?([^"')]+)["']?\)"#).expect("bg pattern is valid"));

/// 缩略图尺寸段，替换成高清变体
static THUMB_SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=w\d+-h\d+-k-no").expect("thumb pattern is valid"));

/// 提取图片链接
///
/// 多级回退打开画廊；检测到单图标志时短路返回那一张。
/// 单图模式取第一个有效URL，多图模式滚动画廊收集全部。
/// 整个子提取失败时重载页面重试，最多三次。
pub async fn extract_images(page: &Page, single_image: bool) -> Result<Vec<String>, BrowserError> {
    let mut last_error = BrowserError::Page("图片提取未开始".to_string());
    for attempt in 1..=MAX_ATTEMPTS {
        match extract_images_once(page, single_image).await {
            Ok(urls) if !urls.is_empty() => return Ok(urls),
            Ok(_) => {
                last_error = BrowserError::Page("画廊中没有有效图片".to_string());
            }
            Err(e) => {
                last_error = e;
            }
        }
        if attempt < MAX_ATTEMPTS {
            warn!(attempt, "Image extraction failed, reloading page");
            if let Err(e) = page.reload().await {
                return Err(BrowserError::Page(format!("Page reload failed: {}", e)));
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
    Err(last_error)
}

async fn extract_images_once(page: &Page, single_image: bool) -> Result<Vec<String>, BrowserError> {
    open_gallery(page).await?;

    // 单图标志：该列表只有一张代表图，直接短路
    if selector_present(page, selectors::SINGLE_IMAGE_MARKER).await {
        debug!("Single representative image marker detected");
        let urls = collect_tile_urls(page).await;
        return Ok(urls.into_iter().take(1).collect());
    }

    if single_image {
        let urls = collect_tile_urls(page).await;
        return Ok(urls.into_iter().take(1).collect());
    }

    crate::browser::scroll_until_stable(
        page,
        selectors::GALLERY_SCROLL_PANE,
        GALLERY_SCROLL_ITERATIONS,
        GALLERY_SCROLL_STABLE,
        GALLERY_SCROLL_DELAY,
    )
    .await?;
    Ok(collect_tile_urls(page).await)
}

/// 多级回退打开画廊
async fn open_gallery(page: &Page) -> Result<(), BrowserError> {
    let openers = [selectors::HERO_IMAGE_BUTTON, selectors::GALLERY_OPEN_FALLBACK];
    for opener in openers {
        if let Ok(element) = page.find_element(opener).await {
            if element.click().await.is_ok() {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                return Ok(());
            }
        }
    }
    Err(BrowserError::Page("无法打开图片画廊".to_string()))
}

/// 收集画廊瓦片的背景图URL，升级为高清并去重
async fn collect_tile_urls(page: &Page) -> Vec<String> {
    let tiles = page
        .find_elements(selectors::GALLERY_TILE)
        .await
        .unwrap_or_default();
    let mut urls = Vec::new();
    for tile in tiles {
        let Ok(Some(style)) = tile.attribute("style").await else {
            continue;
        };
        if let Some(url) = background_image_url(&style) {
            let upgraded = upgrade_to_hd(&url);
            if is_valid_image_url(&upgraded) && !urls.contains(&upgraded) {
                urls.push(upgraded);
            }
        }
    }
    urls
}

fn background_image_url(style: &str) -> Option<String> {
    BG_URL_RE
        .captures(style)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 缩略图URL升级为高清变体
fn upgrade_to_hd(url: &str) -> String {
    THUMB_SIZE_RE.replace(url, "=s4196-v1").into_owned()
}

fn is_valid_image_url(url: &str) -> bool {
    !url.is_empty() && !url.contains("//:0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_image_url() {
        let style = r#"background-image: url("https://lh5.example.com/p/abc=w203-h152-k-no");"#;
        assert_eq!(
            background_image_url(style).as_deref(),
            Some("https://lh5.example.com/p/abc=w203-h152-k-no")
        );
        assert!(background_image_url("color: red;").is_none());
    }

    #[test]
    fn test_upgrade_to_hd() {
        assert_eq!(
            upgrade_to_hd("https://lh5.example.com/p/abc=w203-h152-k-no"),
            "https://lh5.example.com/p/abc=s4196-v1"
        );
        // 已是高清或无尺寸段的URL保持不变
        assert_eq!(
            upgrade_to_hd("https://lh5.example.com/p/abc=s4196-v1"),
            "https://lh5.example.com/p/abc=s4196-v1"
        );
    }

    #[test]
    fn test_invalid_placeholder_filtered() {
        assert!(!is_valid_image_url("//:0"));
        assert!(!is_valid_image_url(""));
        assert!(is_valid_image_url("https://lh5.example.com/p/abc"));
    }
}
