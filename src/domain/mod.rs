// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：任务、位置、列表结果等核心实体
/// - 仓库接口（repositories）：任务状态与信用额度的持久化抽象接口
///
/// 领域层不依赖于任何外部实现，体现纯粹的业务规则。
pub mod models;
pub mod repositories;
