// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use chromiumoxide::Page;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::browser::{page_url, selector_present, selectors};
use crate::domain::models::listing::DataField;
use crate::utils::errors::BrowserError;

/// 从解析后的URL中提取坐标，!3d纬度!4d经度
static COORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!3d(-?\d+\.\d+)!4d(-?\d+\.\d+)").expect("coordinate pattern is valid")
});

/// 从URL解析坐标对 (纬度, 经度)
///
/// 坐标来自URL模式匹配而非DOM，页面还没渲染完也能拿到
pub fn parse_coordinates(url: &str) -> Option<(f64, f64)> {
    let caps = COORD_RE.captures(url)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    Some((lat, lon))
}

/// 按字段分发到对应的提取器
///
/// 每个提取器只读取当前页面状态，互不影响。
/// 重字段和派生字段由提取工作器单独走专用路径，不经过这里。
pub async fn extract_field(page: &Page, field: DataField) -> Result<Value, BrowserError> {
    match field {
        DataField::Title => text_of(page, selectors::DETAIL_TITLE).await.map(Value::String),
        DataField::AvgRating => text_of(page, selectors::AVG_RATING).await.map(Value::String),
        DataField::RatingCount => {
            let raw = text_of(page, selectors::RATING_COUNT).await?;
            Ok(Value::String(
                raw.trim_matches(|c| c == '(' || c == ')').replace(',', ""),
            ))
        }
        DataField::Address => text_of(page, selectors::ADDRESS).await.map(Value::String),
        DataField::Website => {
            let href = attribute_of(page, selectors::WEBSITE, "href").await?;
            Ok(Value::String(href))
        }
        DataField::Phone => text_of(page, selectors::PHONE).await.map(Value::String),
        DataField::Category => text_of(page, selectors::CATEGORY).await.map(Value::String),
        DataField::Wheelchair => {
            let present = selector_present(page, selectors::WHEELCHAIR_BADGE).await;
            Ok(Value::String(yes_no(present)))
        }
        DataField::PermanentlyClosed => {
            let closed = match text_of(page, selectors::CLOSED_NOTICE).await {
                Ok(text) => text.to_lowercase().contains("closed"),
                Err(_) => false,
            };
            Ok(Value::String(yes_no(closed)))
        }
        DataField::Workhours => extract_workhours(page).await.map(Value::String),
        DataField::GoogleMapLink => page_url(page).await.map(Value::String),
        DataField::Latitude => {
            let url = page_url(page).await?;
            let (lat, _) = parse_coordinates(&url)
                .ok_or_else(|| BrowserError::Page("URL中没有坐标".to_string()))?;
            Ok(Value::String(lat.to_string()))
        }
        DataField::Longitude => {
            let url = page_url(page).await?;
            let (_, lon) = parse_coordinates(&url)
                .ok_or_else(|| BrowserError::Page("URL中没有坐标".to_string()))?;
            Ok(Value::String(lon.to_string()))
        }
        DataField::City | DataField::State | DataField::Postcode => Err(BrowserError::Page(
            format!("Derived field is resolved via address geocoding: {}", field),
        )),
        DataField::Reviews | DataField::Images => Err(BrowserError::Page(format!(
            "重字段走专用提取路径: {}",
            field
        ))),
    }
}

fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

async fn text_of(page: &Page, selector: &str) -> Result<String, BrowserError> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::Page(format!("Element not found: {}", selector)))?;
    let text = element
        .inner_text()
        .await
        .map_err(|e| BrowserError::Page(format!("Failed to read text: {}", e)))?
        .unwrap_or_default();
    Ok(text.trim().to_string())
}

async fn attribute_of(page: &Page, selector: &str, name: &str) -> Result<String, BrowserError> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::Page(format!("Element not found: {}", selector)))?;
    element
        .attribute(name)
        .await
        .map_err(|e| BrowserError::Page(format!("Failed to read attribute: {}", e)))?
        .ok_or_else(|| BrowserError::Page(format!("Attribute missing: {}", name)))
}

/// 营业时间的三级回退
///
/// aria-label 摘要 → 已展开的时间表 → 点开折叠面板再读表
async fn extract_workhours(page: &Page) -> Result<String, BrowserError> {
    if let Ok(aria) = attribute_of(page, selectors::WORKHOURS_ARIA, "aria-label").await {
        if !aria.is_empty() {
            return Ok(aria);
        }
    }
    if let Ok(table) = text_of(page, selectors::WORKHOURS_TABLE).await {
        if !table.is_empty() {
            return Ok(table);
        }
    }
    debug!("Workhours fallbacks exhausted, expanding hours panel");
    if let Ok(toggle) = page.find_element(selectors::WORKHOURS_TOGGLE).await {
        if toggle.click().await.is_ok() {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Ok(table) = text_of(page, selectors::WORKHOURS_TABLE).await {
                if !table.is_empty() {
                    return Ok(table);
                }
            }
        }
    }
    Err(BrowserError::Page("营业时间不可用".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates_from_resolved_url() {
        let url = "https://www.google.com/maps/place/Spot/@39.7,-104.9,17z/data=!3m1!4b1!4m6!3m5!1s0x0:0x0!8m2!3d39.7392358!4d-104.990251!16s";
        let (lat, lon) = parse_coordinates(url).unwrap();
        assert!((lat - 39.7392358).abs() < 1e-9);
        assert!((lon - -104.990251).abs() < 1e-9);
    }

    #[test]
    fn test_parse_coordinates_missing() {
        assert!(parse_coordinates("https://www.google.com/maps/search/pizza").is_none());
    }
}
