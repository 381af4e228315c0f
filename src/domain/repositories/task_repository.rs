// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::task::{ScrapeTask, TaskStatus};
use crate::utils::errors::RepositoryError;

/// 任务仓库特质
///
/// 编排器通过它在固定检查点写回状态与进度。
/// 任务行的真正持久化属于外部协作方，本特质只约定契约。
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建任务
    async fn create(&self, task: &ScrapeTask) -> Result<(), RepositoryError>;

    /// 按ID读取任务
    async fn get(&self, id: Uuid) -> Result<ScrapeTask, RepositoryError>;

    /// 更新任务状态
    async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<(), RepositoryError>;

    /// 更新进度百分比
    ///
    /// 实现必须保证进度单调不减：小于当前值的写入被忽略
    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<(), RepositoryError>;

    /// 标记任务完成并写入结果字段
    async fn mark_completed(
        &self,
        id: Uuid,
        total_results: u64,
        credits_used: u64,
        csv_url: &str,
        json_url: &str,
    ) -> Result<(), RepositoryError>;

    /// 标记任务失败并记录错误信息
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError>;
}
