// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use mapharvest::browser::captcha_solver::PollingCaptchaSolver;
use mapharvest::config::settings::Settings;
use mapharvest::domain::models::task::{ScrapeTask, TaskConfig};
use mapharvest::domain::repositories::task_repository::TaskRepository;
use mapharvest::infrastructure::gazetteer::Gazetteer;
use mapharvest::infrastructure::geocoding::AddressGeocoder;
use mapharvest::infrastructure::repositories::{InMemoryCreditsRepository, InMemoryTaskRepository};
use mapharvest::infrastructure::result_sink::FileResultSink;
use mapharvest::pipeline::orchestrator::ScrapeOrchestrator;
use mapharvest::utils::telemetry;

/// 任务请求文件
///
/// 单进程运行模式的输入：一个JSON文件描述用户与任务配置
#[derive(Debug, Deserialize)]
struct TaskRequest {
    #[serde(default = "default_user")]
    user_id: String,
    #[serde(default = "default_credits")]
    credits: u64,
    config: TaskConfig,
}

fn default_user() -> String {
    "local".to_string()
}

fn default_credits() -> u64 {
    100_000
}

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并执行一个抓取任务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting mapharvest...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // 3. Read the task request file
    let request_path = std::env::args()
        .nth(1)
        .context("Usage: mapharvest <task-request.json>")?;
    let raw = std::fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read task request file: {}", request_path))?;
    let request: TaskRequest =
        serde_json::from_str(&raw).context("Failed to parse task request JSON")?;

    // 4. Initialize Components
    let gazetteer = Arc::new(Gazetteer::load(&settings.gazetteer.data_path)?);
    let geocoder = Arc::new(AddressGeocoder::new(&settings.geocoding)?);
    let sink = Arc::new(FileResultSink::new(
        settings.output.dir.clone(),
        settings.output.base_url.clone(),
    ));
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let credits = Arc::new(InMemoryCreditsRepository::with_balance(
        request.user_id.clone(),
        request.credits,
    ));
    let solver = Arc::new(PollingCaptchaSolver);

    // 5. Create the task record
    let task = ScrapeTask::new(request.user_id, request.config);
    tasks.create(&task).await?;
    info!(task_id = %task.id, "Task created");

    // 6. Run the pipeline
    let orchestrator = ScrapeOrchestrator::new(
        settings,
        tasks.clone(),
        credits,
        sink,
        gazetteer,
        geocoder,
        solver,
    );
    orchestrator.run(&task).await?;

    let finished = tasks.get(task.id).await?;
    info!(
        task_id = %task.id,
        status = %finished.status,
        total_results = ?finished.total_results,
        csv = ?finished.result_csv_url,
        "Task finished"
    );
    Ok(())
}
