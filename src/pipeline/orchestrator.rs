// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::browser::captcha_solver::CaptchaSolver;
use crate::browser::BrowserSession;
use crate::config::settings::Settings;
use crate::domain::models::listing::ExtractionResult;
use crate::domain::models::task::{ResolvedOptions, ScrapeTask, TaskStatus};
use crate::domain::repositories::credits_repository::CreditsRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::infrastructure::gazetteer::Gazetteer;
use crate::infrastructure::geocoding::AddressGeocoder;
use crate::infrastructure::result_sink::ResultSink;
use crate::pipeline::discovery::LinkDiscoveryWorker;
use crate::pipeline::expander;
use crate::pipeline::extraction::{is_final_result, DetailExtractionWorker};
use crate::pipeline::PipelineContext;
use crate::utils::errors::PipelineError;

/// 发现阶段心跳间隔
const DISCOVERY_HEARTBEAT: Duration = Duration::from_secs(3);
/// 提取阶段心跳间隔
const EXTRACTION_HEARTBEAT: Duration = Duration::from_secs(2);

/// 抓取编排器
///
/// 按任务驱动整条管道：展开位置、启动浏览器、
/// 拉起两个工作器池、汇报进度、落盘结果、结算额度。
/// 状态机 pending → running → {completed | failed}，
/// 任何未消化的错误把任务打入 failed 终态并附上错误信息。
pub struct ScrapeOrchestrator {
    settings: Settings,
    tasks: Arc<dyn TaskRepository>,
    credits: Arc<dyn CreditsRepository>,
    sink: Arc<dyn ResultSink>,
    gazetteer: Arc<Gazetteer>,
    geocoder: Arc<AddressGeocoder>,
    solver: Arc<dyn CaptchaSolver>,
}

impl ScrapeOrchestrator {
    pub fn new(
        settings: Settings,
        tasks: Arc<dyn TaskRepository>,
        credits: Arc<dyn CreditsRepository>,
        sink: Arc<dyn ResultSink>,
        gazetteer: Arc<Gazetteer>,
        geocoder: Arc<AddressGeocoder>,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Self {
        Self {
            settings,
            tasks,
            credits,
            sink,
            gazetteer,
            geocoder,
            solver,
        }
    }

    /// 执行一个任务到终态
    pub async fn run(&self, task: &ScrapeTask) -> Result<(), PipelineError> {
        info!(task_id = %task.id, query = %task.config.search_query, "Task starting");
        match self.run_inner(task).await {
            Ok(()) => {
                info!(task_id = %task.id, "Task completed");
                Ok(())
            }
            Err(e) => {
                error!(task_id = %task.id, "Task failed: {}", e);
                if let Err(mark_err) = self.tasks.mark_failed(task.id, &e.to_string()).await {
                    error!(task_id = %task.id, "Failed to record task failure: {}", mark_err);
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, task: &ScrapeTask) -> Result<(), PipelineError> {
        self.tasks.update_status(task.id, TaskStatus::Running).await?;
        self.progress(task.id, 5).await;

        // 位置展开
        let units = expander::expand(&self.gazetteer, &task.config.location_rules);
        if units.is_empty() {
            return Err(PipelineError::NoLocations);
        }
        self.progress(task.id, 10).await;

        // 选项与字段解析，贯穿整个管道的唯一一份
        let options = ResolvedOptions::resolve(&task.config.advanced_options, &self.settings.scraping);
        let fields = if task.config.data_fields.is_empty() {
            self.settings.scraping.default_fields.clone()
        } else {
            task.config.data_fields.clone()
        };
        self.progress(task.id, 15).await;

        // 浏览器启动；无论后续成败都在收尾统一关闭
        let session = Arc::new(BrowserSession::launch(&self.settings.browser).await?);
        self.progress(task.id, 20).await;

        let outcome = self
            .run_pipeline(task, Arc::clone(&session), units, fields, options)
            .await;

        match Arc::try_unwrap(session) {
            Ok(session) => session.close().await,
            Err(_) => warn!(task_id = %task.id, "Browser session still referenced at teardown"),
        }
        outcome
    }

    async fn run_pipeline(
        &self,
        task: &ScrapeTask,
        session: Arc<BrowserSession>,
        units: Vec<crate::domain::models::location::SearchUnit>,
        fields: Vec<String>,
        options: ResolvedOptions,
    ) -> Result<(), PipelineError> {
        let total_units = units.len();
        let ctx = Arc::new(PipelineContext::new());
        let results: Arc<Mutex<Vec<ExtractionResult>>> = Arc::new(Mutex::new(Vec::new()));
        let pending: Arc<Mutex<VecDeque<_>>> = Arc::new(Mutex::new(units.into_iter().collect()));
        self.progress(task.id, 25).await;

        // 两个池同时启动，提取端在发现端结束前就开始消费
        let discovery_handles: Vec<_> = (0..self.settings.concurrency.link_finder_workers)
            .map(|i| {
                let worker = LinkDiscoveryWorker::new(
                    i,
                    Arc::clone(&session),
                    Arc::clone(&ctx),
                    Arc::clone(&self.solver),
                    Arc::clone(&pending),
                    task.config.search_query.clone(),
                    task.config.rating_filter.clone(),
                    Duration::from_secs(self.settings.browser.navigation_timeout_secs),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        let extraction_handles: Vec<_> = (0..self.settings.concurrency.data_extractor_workers)
            .map(|i| {
                let worker = DetailExtractionWorker::new(
                    i,
                    Arc::clone(&session),
                    Arc::clone(&ctx),
                    Arc::clone(&self.solver),
                    Arc::clone(&self.geocoder),
                    fields.clone(),
                    options.clone(),
                    Duration::from_secs(self.settings.browser.navigation_timeout_secs),
                    Arc::clone(&results),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        self.progress(task.id, 30).await;

        // 发现阶段心跳：30 → 50，按已消费单元比例
        let heartbeat = self.spawn_heartbeat(
            task.id,
            Arc::clone(&ctx),
            HeartbeatPhase::Discovery { total_units },
        );
        for handle in discovery_handles {
            if let Err(e) = handle.await {
                warn!(task_id = %task.id, "Discovery worker panicked: {}", e);
            }
        }
        heartbeat.abort();

        // 发现端全部退出才是提取端唯一的终止信号
        ctx.links.notify_producers_finished();
        self.progress(task.id, 50).await;

        // 提取阶段心跳：50 → 85，按已消费链接比例
        let heartbeat = self.spawn_heartbeat(
            task.id,
            Arc::clone(&ctx),
            HeartbeatPhase::Extraction,
        );
        for handle in extraction_handles {
            if let Err(e) = handle.await {
                warn!(task_id = %task.id, "Extraction worker panicked: {}", e);
            }
        }
        heartbeat.abort();
        self.progress(task.id, 85).await;

        // 结果落盘：校验侧文件尽力而为，主产物失败才算任务失败
        let all_results = std::mem::take(&mut *results.lock());
        let skipped = std::mem::take(&mut *ctx.skipped.lock());
        if let Err(e) = self
            .sink
            .save_verification(task.id, &all_results, &skipped)
            .await
        {
            warn!(task_id = %task.id, "Verification side-file failed: {}", e);
        }

        let final_results: Vec<ExtractionResult> =
            all_results.into_iter().filter(is_final_result).collect();
        let artifacts = self.sink.save(task.id, &fields, &final_results).await?;
        self.progress(task.id, 90).await;

        // 每行结果一个信用额度
        self.credits
            .deduct(&task.user_id, artifacts.row_count, task.id, "scrape_results")
            .await?;
        self.progress(task.id, 95).await;

        self.tasks
            .mark_completed(
                task.id,
                artifacts.row_count,
                artifacts.row_count,
                &artifacts.csv_url,
                &artifacts.json_url,
            )
            .await?;
        Ok(())
    }

    /// 周期性把阶段进度写回任务行
    fn spawn_heartbeat(
        &self,
        task_id: Uuid,
        ctx: Arc<PipelineContext>,
        phase: HeartbeatPhase,
    ) -> tokio::task::JoinHandle<()> {
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            let interval = match phase {
                HeartbeatPhase::Discovery { .. } => DISCOVERY_HEARTBEAT,
                HeartbeatPhase::Extraction => EXTRACTION_HEARTBEAT,
            };
            loop {
                tokio::time::sleep(interval).await;
                let progress = match phase {
                    HeartbeatPhase::Discovery { total_units } => {
                        let done = ctx.units_done.load(Ordering::Relaxed);
                        30 + phase_share(done, total_units, 20)
                    }
                    HeartbeatPhase::Extraction => {
                        let done = ctx.links_done.load(Ordering::Relaxed);
                        let total = ctx.links.seen_count();
                        50 + phase_share(done, total, 35)
                    }
                };
                if let Err(e) = tasks.update_progress(task_id, progress).await {
                    warn!(task_id = %task_id, "Progress heartbeat failed: {}", e);
                    break;
                }
            }
        })
    }

    async fn progress(&self, task_id: Uuid, value: u8) {
        if let Err(e) = self.tasks.update_progress(task_id, value).await {
            warn!(task_id = %task_id, "Progress checkpoint failed: {}", e);
        }
    }
}

#[derive(Clone, Copy)]
enum HeartbeatPhase {
    Discovery { total_units: usize },
    Extraction,
}

/// 已完成比例折算到阶段的进度份额
fn phase_share(done: usize, total: usize, span: u8) -> u8 {
    if total == 0 {
        return 0;
    }
    let share = (done as f64 / total as f64 * span as f64) as u8;
    share.min(span)
}
