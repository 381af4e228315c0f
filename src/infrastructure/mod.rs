// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施模块
///
/// 地名录、地理编码、结果落盘与仓库实现
pub mod gazetteer;
pub mod geocoding;
pub mod repositories;
pub mod result_sink;
