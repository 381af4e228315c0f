// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 浏览器模块
///
/// 基于 Chrome DevTools Protocol 的页面导航、字段提取与交互
pub mod browser;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、任务模型和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如地名录、地理编码、结果落盘等
pub mod infrastructure;

/// 管道模块
///
/// 实现两阶段抓取管道：链接发现与详情提取
pub mod pipeline;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
