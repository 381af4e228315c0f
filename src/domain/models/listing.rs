// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 单个链接的提取结果
///
/// data 按字段名存放提取值；errors 按字段名存放失败原因，
/// 两者互不影响——某个字段失败不会中止其余字段。
/// Skipped 结果不携带数据，只出现在校验侧文件里。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 来源链接
    pub url: String,
    /// 字段名 -> 提取值
    pub data: BTreeMap<String, Value>,
    /// 字段名 -> 错误信息
    pub errors: BTreeMap<String, String>,
    /// 结果状态
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    /// 按请求的字段列表初始化一个空结果
    pub fn empty(url: impl Into<String>, fields: &[String]) -> Self {
        let mut data = BTreeMap::new();
        for f in fields {
            data.insert(f.clone(), Value::String(String::new()));
        }
        Self {
            url: url.into(),
            data,
            errors: BTreeMap::new(),
            status: ExtractionStatus::Ok,
        }
    }

    /// 标记为重复坐标而跳过
    pub fn skipped(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
            status: ExtractionStatus::Skipped,
        }
    }
}

/// 提取结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// 正常结果（可能携带字段级错误）
    Ok,
    /// 重复地理坐标，排除出最终输出
    Skipped,
}

/// 因坐标重复被跳过的链接记录，写入校验侧文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedLink {
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// 单条评论
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// 评论者
    pub reviewer: String,
    /// 评分，形如 "4/5"
    pub rating: String,
    /// 相对日期文本
    pub date: String,
    /// 评论内容
    pub content: String,
}

/// 可提取字段的封闭枚举
///
/// 字段名到提取器的注册表。新增字段时在此枚举、`as_str`、
/// `FromStr` 和 `browser::fields` 的分发处同步补齐。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataField {
    Title,
    AvgRating,
    RatingCount,
    Address,
    Website,
    Phone,
    Category,
    Wheelchair,
    Workhours,
    PermanentlyClosed,
    GoogleMapLink,
    Latitude,
    Longitude,
    /// 由 address 地理编码派生
    City,
    /// 由 address 地理编码派生
    State,
    /// 由 address 地理编码派生
    Postcode,
    /// 重字段：评论列表
    Reviews,
    /// 重字段：图片链接
    Images,
}

impl DataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataField::Title => "title",
            DataField::AvgRating => "avg_rating",
            DataField::RatingCount => "rating_count",
            DataField::Address => "address",
            DataField::Website => "website",
            DataField::Phone => "phone",
            DataField::Category => "category",
            DataField::Wheelchair => "wheelchair",
            DataField::Workhours => "workhours",
            DataField::PermanentlyClosed => "permanently_closed",
            DataField::GoogleMapLink => "google_map_link",
            DataField::Latitude => "latitude",
            DataField::Longitude => "longitude",
            DataField::City => "city",
            DataField::State => "state",
            DataField::Postcode => "postcode",
            DataField::Reviews => "reviews",
            DataField::Images => "images",
        }
    }

    /// 重字段的提取代价高，受条件抓取门控
    pub fn is_heavy(&self) -> bool {
        matches!(self, DataField::Reviews | DataField::Images)
    }

    /// 该字段由 address 派生而非直接从页面读取
    pub fn is_derived(&self) -> bool {
        matches!(self, DataField::City | DataField::State | DataField::Postcode)
    }
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 字段名解析错误
#[derive(Error, Debug)]
#[error("unknown data field: {0}")]
pub struct ParseDataFieldError(String);

impl FromStr for DataField {
    type Err = ParseDataFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(DataField::Title),
            "avg_rating" => Ok(DataField::AvgRating),
            "rating_count" => Ok(DataField::RatingCount),
            "address" => Ok(DataField::Address),
            "website" => Ok(DataField::Website),
            "phone" => Ok(DataField::Phone),
            "category" => Ok(DataField::Category),
            "wheelchair" => Ok(DataField::Wheelchair),
            "workhours" => Ok(DataField::Workhours),
            "permanently_closed" => Ok(DataField::PermanentlyClosed),
            "google_map_link" => Ok(DataField::GoogleMapLink),
            "latitude" => Ok(DataField::Latitude),
            "longitude" => Ok(DataField::Longitude),
            "city" => Ok(DataField::City),
            "state" => Ok(DataField::State),
            "postcode" => Ok(DataField::Postcode),
            "reviews" => Ok(DataField::Reviews),
            "images" => Ok(DataField::Images),
            other => Err(ParseDataFieldError(other.to_string())),
        }
    }
}
