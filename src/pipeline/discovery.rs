// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::browser::captcha_solver::CaptchaSolver;
use crate::browser::search::search_listings;
use crate::browser::{BrowserSession, PageProfile};
use crate::domain::models::location::SearchUnit;
use crate::pipeline::PipelineContext;
use crate::utils::retry_policy::{retry_on_transient, RetryPolicy};

/// 链接发现工作器
///
/// 从共享待办列表取搜索单元，执行地图搜索并把候选链接
/// 推进队列。单元级失败只记录日志，不影响池里的其他工作器。
/// 单元之间随机延迟以降低请求突发度。
pub struct LinkDiscoveryWorker {
    id: usize,
    session: Arc<BrowserSession>,
    ctx: Arc<PipelineContext>,
    solver: Arc<dyn CaptchaSolver>,
    units: Arc<Mutex<VecDeque<SearchUnit>>>,
    keywords: String,
    rating_filter: Option<String>,
    nav_timeout: Duration,
}

impl LinkDiscoveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        session: Arc<BrowserSession>,
        ctx: Arc<PipelineContext>,
        solver: Arc<dyn CaptchaSolver>,
        units: Arc<Mutex<VecDeque<SearchUnit>>>,
        keywords: String,
        rating_filter: Option<String>,
        nav_timeout: Duration,
    ) -> Self {
        Self {
            id,
            session,
            ctx,
            solver,
            units,
            keywords,
            rating_filter,
            nav_timeout,
        }
    }

    /// 工作器主循环，待办列表排空后退出
    pub async fn run(self) {
        let page = match self.session.new_page(PageProfile::Discovery).await {
            Ok(page) => page,
            Err(e) => {
                error!(worker = self.id, "Discovery worker failed to open page: {}", e);
                return;
            }
        };
        info!(worker = self.id, "Discovery worker started");

        loop {
            let unit = {
                let mut units = self.units.lock();
                units.pop_front()
            };
            let Some(unit) = unit else {
                break;
            };

            self.process_unit(&page, &unit).await;
            self.ctx.units_done.fetch_add(1, Ordering::Relaxed);

            // 单元间的礼貌延迟：1200ms基础 + 最多800ms抖动
            let jitter = rand::random_range(0..800u64);
            tokio::time::sleep(Duration::from_millis(1200 + jitter)).await;
        }

        if let Err(e) = page.close().await {
            debug!(worker = self.id, "Discovery page close failed: {}", e);
        }
        info!(worker = self.id, "Discovery worker finished");
    }

    /// 处理单个搜索单元，永久失败不致命
    async fn process_unit(&self, page: &chromiumoxide::Page, unit: &SearchUnit) {
        let query = format!("{} in {}", self.keywords, unit.search_query);
        debug!(worker = self.id, location = %unit.describe(), "Searching unit");

        let policy = RetryPolicy::search();
        let outcome = retry_on_transient(&policy, &format!("search[{}]", unit.id), || {
            search_listings(
                page,
                &self.ctx.captcha,
                self.solver.as_ref(),
                &query,
                self.rating_filter.as_deref(),
                self.nav_timeout,
            )
        })
        .await;

        match outcome {
            Ok(links) => {
                let added = self.ctx.links.add_links(links);
                debug!(
                    worker = self.id,
                    unit = %unit.id,
                    added,
                    "Unit links enqueued"
                );
            }
            Err(e) => {
                warn!(
                    worker = self.id,
                    unit = %unit.id,
                    "Unit permanently failed after retries: {}",
                    e
                );
            }
        }
    }
}
