// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 任务状态与信用额度的持久化抽象接口，
/// 具体实现位于基础设施层
pub mod credits_repository;
pub mod task_repository;
