// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use mapharvest::browser::captcha_solver::PollingCaptchaSolver;
use mapharvest::config::settings::Settings;
use mapharvest::domain::models::location::LocationRules;
use mapharvest::domain::models::task::{ScrapeTask, TaskConfig, TaskStatus};
use mapharvest::domain::repositories::task_repository::TaskRepository;
use mapharvest::infrastructure::gazetteer::Gazetteer;
use mapharvest::infrastructure::geocoding::AddressGeocoder;
use mapharvest::infrastructure::repositories::{InMemoryCreditsRepository, InMemoryTaskRepository};
use mapharvest::infrastructure::result_sink::FileResultSink;
use mapharvest::pipeline::orchestrator::ScrapeOrchestrator;
use mapharvest::utils::errors::PipelineError;

/// 测试位置规则展不出任何单元时任务进入failed终态
///
/// 空的地名录加空的base规则展开为零个搜索单元，
/// 编排器应在启动浏览器之前就终止并写回错误信息
#[tokio::test]
async fn test_empty_location_rules_fail_task() {
    let settings = Settings::new().unwrap();
    let geocoder = Arc::new(AddressGeocoder::new(&settings.geocoding).unwrap());

    let tmp = tempfile::tempdir().unwrap();
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let credits = Arc::new(InMemoryCreditsRepository::with_balance("user-1", 100));
    let sink = Arc::new(FileResultSink::new(tmp.path(), "http://localhost:3001"));
    let gazetteer = Arc::new(Gazetteer::default());
    let solver = Arc::new(PollingCaptchaSolver);

    let orchestrator = ScrapeOrchestrator::new(
        settings,
        Arc::clone(&tasks) as Arc<dyn TaskRepository>,
        credits,
        sink,
        gazetteer,
        geocoder,
        solver,
    );

    let config = TaskConfig {
        search_query: "indoor playground".to_string(),
        data_fields: vec![],
        rating_filter: None,
        advanced_options: Default::default(),
        location_rules: LocationRules::default(),
        total_selected_zip_codes: None,
    };
    let task = ScrapeTask::new("user-1", config);
    tasks.create(&task).await.unwrap();

    let result = orchestrator.run(&task).await;
    assert!(matches!(result, Err(PipelineError::NoLocations)));

    let stored = tasks.get(task.id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    let message = stored.error_message.unwrap();
    assert!(!message.is_empty());
}
