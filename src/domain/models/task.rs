// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::location::LocationRules;

/// 抓取任务实体
///
/// 表示一次完整的列表抓取请求。任务配置是唯一的配置来源，
/// 编排器在启动时读取一次，之后只写回状态、进度和结果字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTask {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 发起任务的用户ID，用于信用额度结算
    pub user_id: String,
    /// 任务配置，创建后不可变
    pub config: TaskConfig,
    /// 任务状态，跟踪任务在其生命周期中的当前阶段
    pub status: TaskStatus,
    /// 进度百分比 (0-100)，单调不减
    pub progress: u8,
    /// 最终结果行数
    pub total_results: Option<u64>,
    /// 本次任务扣除的信用额度
    pub credits_used: Option<u64>,
    /// 失败时的错误信息，取第一个未被处理的错误
    pub error_message: Option<String>,
    /// CSV结果下载链接
    pub result_csv_url: Option<String>,
    /// JSON结果下载链接
    pub result_json_url: Option<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl ScrapeTask {
    /// 创建新的待处理任务
    pub fn new(user_id: impl Into<String>, config: TaskConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            config,
            status: TaskStatus::Pending,
            progress: 0,
            total_results: None,
            credits_used: None,
            error_message: None,
            result_csv_url: None,
            result_json_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 任务状态枚举
///
/// 状态机：pending → running → {completed | failed}。
/// completed 和 failed 为终态，失败不自动重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 等待处理
    Pending,
    /// 正在处理
    Running,
    /// 处理完成
    Completed,
    /// 处理失败
    Failed,
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// 任务状态解析错误
#[derive(Error, Debug)]
#[error("未知任务状态: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ParseTaskStatusError(other.to_string())),
        }
    }
}

/// 任务配置
///
/// 来自任务记录的 config 字段，是整个管道的唯一配置来源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// 搜索关键词
    pub search_query: String,
    /// 要提取的字段列表
    #[serde(default)]
    pub data_fields: Vec<String>,
    /// 评分过滤档位，如 "4.5+"
    #[serde(default)]
    pub rating_filter: Option<String>,
    /// 高级选项
    #[serde(default)]
    pub advanced_options: AdvancedOptions,
    /// 地理范围规则
    pub location_rules: LocationRules,
    /// 前端预估的ZIP总数，仅用于进度计算
    #[serde(default)]
    pub total_selected_zip_codes: Option<usize>,
}

/// 高级选项
///
/// 所有字段可选，未给出时回退到全局配置默认值。
/// 回退优先级：任务配置 > 全局默认，在管道启动时解析一次。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedOptions {
    /// 单图模式：只取第一张有效图片
    #[serde(default)]
    pub single_image: Option<bool>,
    /// 单个列表最多提取的评论数
    #[serde(default)]
    pub max_reviews: Option<usize>,
    /// 条件抓取配置
    #[serde(default)]
    pub conditional_scraping: Option<ConditionalScraping>,
}

/// 条件抓取配置
///
/// 重字段（评论、图片）只在关键字段命中目标值时提取
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalScraping {
    /// 是否启用
    pub enabled: bool,
    /// 关键字段名，如 "category"
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// 目标值列表，大小写不敏感的子串匹配
    #[serde(default)]
    pub target_value: Vec<String>,
    /// 未命中时完全丢弃该结果
    #[serde(default, alias = "skipmissmatch")]
    pub skip_mismatch: bool,
}

fn default_key_field() -> String {
    "category".to_string()
}

/// 解析后的抓取选项
///
/// 由 `AdvancedOptions` 与全局默认值合并得出，管道内只用这一份
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub single_image: bool,
    pub max_reviews: usize,
    pub conditional: Option<ConditionalScraping>,
}

impl ResolvedOptions {
    /// 合并任务选项与全局默认值
    pub fn resolve(options: &AdvancedOptions, defaults: &crate::config::settings::ScrapingSettings) -> Self {
        Self {
            single_image: options.single_image.unwrap_or(defaults.single_image),
            max_reviews: options.max_reviews.unwrap_or(defaults.max_reviews),
            conditional: options
                .conditional_scraping
                .clone()
                .filter(|c| c.enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ScrapingSettings;

    fn defaults() -> ScrapingSettings {
        ScrapingSettings {
            default_fields: vec!["title".into()],
            single_image: true,
            max_reviews: 100,
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "running", "completed", "failed"] {
            let status: TaskStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("unknown".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_options_fallback_to_defaults() {
        let resolved = ResolvedOptions::resolve(&AdvancedOptions::default(), &defaults());
        assert!(resolved.single_image);
        assert_eq!(resolved.max_reviews, 100);
        assert!(resolved.conditional.is_none());
    }

    #[test]
    fn test_options_task_config_wins() {
        let options = AdvancedOptions {
            single_image: Some(false),
            max_reviews: Some(25),
            conditional_scraping: Some(ConditionalScraping {
                enabled: true,
                key_field: "category".into(),
                target_value: vec!["Indoor Playground".into()],
                skip_mismatch: true,
            }),
        };
        let resolved = ResolvedOptions::resolve(&options, &defaults());
        assert!(!resolved.single_image);
        assert_eq!(resolved.max_reviews, 25);
        assert!(resolved.conditional.is_some());
    }

    #[test]
    fn test_disabled_conditional_is_dropped() {
        let options = AdvancedOptions {
            conditional_scraping: Some(ConditionalScraping {
                enabled: false,
                key_field: "category".into(),
                target_value: vec![],
                skip_mismatch: false,
            }),
            ..Default::default()
        };
        let resolved = ResolvedOptions::resolve(&options, &defaults());
        assert!(resolved.conditional.is_none());
    }

    #[test]
    fn test_skipmissmatch_alias_accepted() {
        // 历史配置使用 skipmissmatch 拼写
        let json = r#"{"enabled":true,"key_field":"category","target_value":["Cafe"],"skipmissmatch":true}"#;
        let parsed: ConditionalScraping = serde_json::from_str(json).unwrap();
        assert!(parsed.skip_mismatch);
    }
}
