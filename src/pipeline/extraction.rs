// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chromiumoxide::Page;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::browser::captcha_solver::{challenge_present, CaptchaSolver};
use crate::browser::fields::{extract_field, parse_coordinates};
use crate::browser::images::extract_images;
use crate::browser::reviews::extract_reviews;
use crate::browser::{page_url, selectors, wait_for_selector, BrowserSession, PageProfile};
use crate::domain::models::listing::{DataField, ExtractionResult, SkippedLink};
use crate::domain::models::task::ResolvedOptions;
use crate::infrastructure::geocoding::AddressGeocoder;
use crate::pipeline::PipelineContext;
use crate::utils::retry_policy::{retry_on_transient, RetryPolicy};

/// 详情页加载标志的硬性等待上限
const CONTENT_TIMEOUT: Duration = Duration::from_secs(30);

/// 详情提取工作器
///
/// 从链接队列消费到哨兵为止。每个链接用一个独立页面处理，
/// 页面在所有退出路径上关闭。字段级失败互相隔离，
/// 只有加载标志超时才是链接级硬失败。
pub struct DetailExtractionWorker {
    id: usize,
    session: Arc<BrowserSession>,
    ctx: Arc<PipelineContext>,
    solver: Arc<dyn CaptchaSolver>,
    geocoder: Arc<AddressGeocoder>,
    fields: Vec<String>,
    options: ResolvedOptions,
    nav_timeout: Duration,
    results: Arc<Mutex<Vec<ExtractionResult>>>,
}

impl DetailExtractionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        session: Arc<BrowserSession>,
        ctx: Arc<PipelineContext>,
        solver: Arc<dyn CaptchaSolver>,
        geocoder: Arc<AddressGeocoder>,
        fields: Vec<String>,
        options: ResolvedOptions,
        nav_timeout: Duration,
        results: Arc<Mutex<Vec<ExtractionResult>>>,
    ) -> Self {
        Self {
            id,
            session,
            ctx,
            solver,
            geocoder,
            fields,
            options,
            nav_timeout,
            results,
        }
    }

    /// 工作器主循环，收到哨兵后退出
    pub async fn run(self) {
        info!(worker = self.id, "Extraction worker started");
        while let Some(link) = self.ctx.links.get_link().await {
            let result = match self.session.new_page(PageProfile::Extraction).await {
                Ok(page) => {
                    let outcome = self.process_link(&page, &link).await;
                    if let Err(e) = page.close().await {
                        debug!(worker = self.id, "Extraction page close failed: {}", e);
                    }
                    outcome
                }
                Err(e) => {
                    error!(worker = self.id, "Failed to open extraction page: {}", e);
                    let mut failed = ExtractionResult::empty(link.clone(), &self.fields);
                    failed.errors.insert("page".to_string(), e.to_string());
                    Some(failed)
                }
            };
            if let Some(result) = result {
                self.results.lock().push(result);
            }
            self.ctx.links_done.fetch_add(1, Ordering::Relaxed);
        }
        info!(worker = self.id, "Extraction worker finished");
    }

    /// 处理单个链接
    ///
    /// 返回 None 表示条件抓取未命中且配置了完全丢弃
    async fn process_link(&self, page: &Page, link: &str) -> Option<ExtractionResult> {
        let mut result = ExtractionResult::empty(link, &self.fields);

        if let Err(e) = self.navigate_with_challenge(page, link).await {
            warn!(worker = self.id, link = %link, "Navigation failed: {}", e);
            result.errors.insert("page".to_string(), e.to_string());
            return Some(result);
        }

        // 加载标志超时是链接级硬失败，不再尝试任何字段
        if let Err(e) = wait_for_selector(page, selectors::DETAIL_TITLE, CONTENT_TIMEOUT).await {
            warn!(worker = self.id, link = %link, "Content marker missing: {}", e);
            result
                .errors
                .insert("page".to_string(), "page_content_unavailable".to_string());
            return Some(result);
        }

        // 坐标去重：先到先得，重复的记入校验侧文件后跳过
        let resolved_url = page_url(page).await.ok();
        let coords = resolved_url.as_deref().and_then(parse_coordinates);
        if let Some((lat, lon)) = coords {
            let key = format!("{lat},{lon}");
            if !self.ctx.register_coordinate(key) {
                debug!(worker = self.id, link = %link, "Duplicate coordinates, skipping");
                self.ctx.record_skipped(SkippedLink {
                    url: link.to_string(),
                    latitude: lat,
                    longitude: lon,
                });
                return Some(ExtractionResult::skipped(link));
            }
        }

        self.extract_plain_fields(page, &mut result).await;

        let gate_open = match &self.options.conditional {
            Some(conditional) => {
                let key_value = result
                    .data
                    .get(&conditional.key_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let matched = matches_target(key_value, &conditional.target_value);
                if !matched && conditional.skip_mismatch {
                    debug!(
                        worker = self.id,
                        link = %link,
                        key = %conditional.key_field,
                        value = %key_value,
                        "Conditional mismatch, result suppressed"
                    );
                    return None;
                }
                matched
            }
            None => true,
        };

        if gate_open {
            self.extract_heavy_fields(page, &mut result).await;
        }

        self.extract_derived_fields(page, &mut result).await;
        Some(result)
    }

    /// 带重试的导航，落在挑战页时本地求解后显式回到目标链接
    async fn navigate_with_challenge(&self, page: &Page, link: &str) -> anyhow::Result<()> {
        let policy = RetryPolicy::navigation();
        retry_on_transient(&policy, &format!("navigate[{}]", self.id), || async {
            tokio::time::timeout(self.nav_timeout, page.goto(link))
                .await
                .map_err(|_| anyhow::anyhow!("navigation timed out: {}", link))?
                .with_context(|| format!("navigation failed: {}", link))?;
            Ok(())
        })
        .await?;

        if challenge_present(page).await {
            self.solver
                .solve(page)
                .await
                .map_err(|e| anyhow::anyhow!("per-page captcha solve failed: {}", e))?;
            // 挑战流程可能把页面带去别处，目标链接是已知的，直接回去
            tokio::time::timeout(self.nav_timeout, page.goto(link))
                .await
                .map_err(|_| anyhow::anyhow!("post-challenge navigation timed out: {}", link))?
                .with_context(|| format!("post-challenge navigation failed: {}", link))?;
        }
        Ok(())
    }

    /// 常规字段逐个提取，单个失败只记入errors
    async fn extract_plain_fields(&self, page: &Page, result: &mut ExtractionResult) {
        for field_name in &self.fields {
            let field = match DataField::from_str(field_name) {
                Ok(field) => field,
                Err(e) => {
                    result.errors.insert(field_name.clone(), e.to_string());
                    continue;
                }
            };
            if field.is_heavy() || field.is_derived() {
                continue;
            }
            match extract_field(page, field).await {
                Ok(value) => {
                    result.data.insert(field_name.clone(), value);
                }
                Err(e) => {
                    result.errors.insert(field_name.clone(), e.to_string());
                }
            }
        }
    }

    /// 重字段：评论与图片
    async fn extract_heavy_fields(&self, page: &Page, result: &mut ExtractionResult) {
        if self.fields.iter().any(|f| f == "reviews") {
            match extract_reviews(page, self.options.max_reviews).await {
                Ok(reviews) => {
                    result.data.insert("reviews".to_string(), json!(reviews));
                }
                Err(e) => {
                    result.errors.insert("reviews".to_string(), e.to_string());
                }
            }
        }
        if self.fields.iter().any(|f| f == "images") {
            match extract_images(page, self.options.single_image).await {
                Ok(images) => {
                    result.data.insert("images".to_string(), json!(images));
                }
                Err(e) => {
                    result.errors.insert("images".to_string(), e.to_string());
                }
            }
        }
    }

    /// 派生字段：地址文本地理编码出 city/state/postcode
    ///
    /// 地址未在请求字段里时按需补提取一次
    async fn extract_derived_fields(&self, page: &Page, result: &mut ExtractionResult) {
        let derived: Vec<&String> = self
            .fields
            .iter()
            .filter(|f| {
                DataField::from_str(f)
                    .map(|d| d.is_derived())
                    .unwrap_or(false)
            })
            .collect();
        if derived.is_empty() {
            return;
        }

        let mut address = result
            .data
            .get(DataField::Address.as_str())
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if address.is_none() {
            address = extract_field(page, DataField::Address)
                .await
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.is_empty());
        }

        let Some(address) = address else {
            for field in derived {
                result
                    .errors
                    .insert(field.clone(), "address unavailable".to_string());
            }
            return;
        };

        match self.geocoder.lookup(&address).await {
            Ok(location) => {
                for field in derived {
                    let value = match field.as_str() {
                        "city" => location.city.clone(),
                        "state" => location.state.clone(),
                        "postcode" => location.postcode.clone(),
                        _ => None,
                    };
                    result
                        .data
                        .insert(field.clone(), json!(value.unwrap_or_default()));
                }
            }
            Err(e) => {
                for field in derived {
                    result.errors.insert(field.clone(), e.to_string());
                }
            }
        }
    }
}

/// 条件抓取的命中判定：不区分大小写的子串匹配
fn matches_target(value: &str, targets: &[String]) -> bool {
    if targets.is_empty() {
        return false;
    }
    let value = value.to_lowercase();
    targets
        .iter()
        .any(|target| value.contains(&target.to_lowercase()))
}

/// 供编排器判断结果是否进入最终输出
pub fn is_final_result(result: &ExtractionResult) -> bool {
    result.status == crate::domain::models::listing::ExtractionStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::listing::ExtractionStatus;

    #[test]
    fn test_matches_target_case_insensitive_substring() {
        let targets = vec!["Indoor Playground".to_string()];
        assert!(matches_target("indoor playground", &targets));
        assert!(matches_target("Best Indoor Playground Center", &targets));
        assert!(!matches_target("Pet Store", &targets));
        assert!(!matches_target("anything", &[]));
    }

    #[test]
    fn test_final_results_exclude_skipped() {
        let ok = ExtractionResult::empty("https://example.com/a", &["title".to_string()]);
        let skipped = ExtractionResult::skipped("https://example.com/b");
        assert!(is_final_result(&ok));
        assert!(!is_final_result(&skipped));
        assert_eq!(skipped.status, ExtractionStatus::Skipped);
    }
}
