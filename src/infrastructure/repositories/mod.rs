// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::models::task::{ScrapeTask, TaskStatus};
use crate::domain::repositories::credits_repository::CreditsRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::errors::RepositoryError;

/// 内存任务仓库
///
/// 单进程运行模式下的任务状态存储。
/// 进度写入保证单调不减并截断到100。
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, ScrapeTask>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &ScrapeTask) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<ScrapeTask, RepositoryError> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let clamped = progress.min(100);
        if clamped > task.progress {
            task.progress = clamped;
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        total_results: u64,
        credits_used: u64,
        csv_url: &str,
        json_url: &str,
    ) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        task.status = TaskStatus::Completed;
        task.progress = 100;
        task.total_results = Some(total_results);
        task.credits_used = Some(credits_used);
        task.result_csv_url = Some(csv_url.to_string());
        task.result_json_url = Some(json_url.to_string());
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        task.status = TaskStatus::Failed;
        task.error_message = Some(message.to_string());
        task.updated_at = Utc::now();
        Ok(())
    }
}

/// 内存信用额度仓库
#[derive(Default)]
pub struct InMemoryCreditsRepository {
    balances: RwLock<HashMap<String, u64>>,
}

impl InMemoryCreditsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置某用户的额度
    pub fn with_balance(user_id: impl Into<String>, amount: u64) -> Self {
        let repo = Self::default();
        repo.balances.write().insert(user_id.into(), amount);
        repo
    }
}

#[async_trait]
impl CreditsRepository for InMemoryCreditsRepository {
    async fn deduct(
        &self,
        user_id: &str,
        amount: u64,
        task_id: Uuid,
        reason: &str,
    ) -> Result<u64, RepositoryError> {
        let mut balances = self.balances.write();
        let balance = balances
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound)?;
        if *balance < amount {
            return Err(RepositoryError::InvalidParameter(format!(
                "Insufficient credits: balance {} needed {} (task={}, reason={})",
                balance, amount, task_id, reason
            )));
        }
        *balance -= amount;
        Ok(*balance)
    }

    async fn balance(&self, user_id: &str) -> Result<u64, RepositoryError> {
        self.balances
            .read()
            .get(user_id)
            .copied()
            .ok_or(RepositoryError::NotFound)
    }
}
