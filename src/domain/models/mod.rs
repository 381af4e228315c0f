// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 定义任务、地理位置和提取结果等核心数据结构
pub mod listing;
pub mod location;
pub mod task;
