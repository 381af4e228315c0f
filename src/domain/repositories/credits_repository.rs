// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::utils::errors::RepositoryError;

/// 信用额度仓库特质
///
/// 每行结果扣除一个信用额度，结算发生在任务完成前
#[async_trait]
pub trait CreditsRepository: Send + Sync {
    /// 扣除用户的信用额度，返回剩余额度
    async fn deduct(
        &self,
        user_id: &str,
        amount: u64,
        task_id: Uuid,
        reason: &str,
    ) -> Result<u64, RepositoryError>;

    /// 查询用户余额
    async fn balance(&self, user_id: &str) -> Result<u64, RepositoryError>;
}
