// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 地理范围规则
///
/// base 为必填的范围入口；exclude 从展开结果中剔除；
/// include 在剔除之后强制加回，优先级最高。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationRules {
    /// 基础范围条目
    #[serde(default)]
    pub base: Vec<LocationEntry>,
    /// 要剔除的条目
    #[serde(default)]
    pub exclude: Vec<LocationEntry>,
    /// 剔除后强制加回的条目
    #[serde(default)]
    pub include: Vec<LocationEntry>,
}

/// 单个范围条目
///
/// type 决定展开方式：country/state/county/city 携带 name，
/// zip 携带 zip_code。county 和 city 还需要 state 字段定位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    /// 条目类型：country | state | county | city | zip
    #[serde(rename = "type")]
    pub kind: String,
    /// 名称（country/state/county/city 使用）
    #[serde(default)]
    pub name: Option<String>,
    /// ZIP编码（zip 类型使用）
    #[serde(default)]
    pub zip_code: Option<String>,
    /// 所属州（county/city 类型必填）
    #[serde(default)]
    pub state: Option<String>,
}

/// 搜索单元粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchUnitKind {
    County,
    City,
    Zip,
}

/// 搜索单元
///
/// 位置展开器产出的一个地理颗粒，创建后不可变，
/// 被恰好一个链接发现工作器消费一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchUnit {
    /// 身份键，用于 exclude/include 的集合运算，如 `zip_80301`
    pub id: String,
    /// 粒度
    pub kind: SearchUnitKind,
    /// ZIP编码
    pub zip_code: Option<String>,
    /// 城市名
    pub city: Option<String>,
    /// 县名
    pub county: Option<String>,
    /// 州名（全称）
    pub state: Option<String>,
    /// 国家代码
    pub country: String,
    /// 构造好的搜索查询串，如 "80301, Boulder, Colorado, US"
    pub search_query: String,
}

impl SearchUnit {
    /// ZIP粒度的搜索单元
    pub fn zip(
        zip_code: impl Into<String>,
        city: Option<String>,
        county: Option<String>,
        state: Option<String>,
    ) -> Self {
        let zip_code = zip_code.into();
        let mut parts: Vec<String> = vec![zip_code.clone()];
        if let Some(c) = &city {
            parts.push(c.clone());
        }
        if let Some(s) = &state {
            parts.push(s.clone());
        }
        parts.push("US".to_string());
        Self {
            id: format!("zip_{}", zip_code),
            kind: SearchUnitKind::Zip,
            zip_code: Some(zip_code),
            city,
            county,
            state,
            country: "US".to_string(),
            search_query: parts.join(", "),
        }
    }

    /// 城市粒度的搜索单元（州缺少ZIP数据时的回退）
    pub fn city(city: impl Into<String>, state: impl Into<String>) -> Self {
        let city = city.into();
        let state = state.into();
        Self {
            id: format!("city_{}_{}", slugify(&city), slugify(&state)),
            kind: SearchUnitKind::City,
            zip_code: None,
            city: Some(city.clone()),
            county: None,
            state: Some(state.clone()),
            country: "US".to_string(),
            search_query: format!("{}, {}, US", city, state),
        }
    }

    /// 县粒度的搜索单元
    pub fn county(county: impl Into<String>, state: impl Into<String>) -> Self {
        let county = county.into();
        let state = state.into();
        Self {
            id: format!("county_{}_{}", slugify(&county), slugify(&state)),
            kind: SearchUnitKind::County,
            zip_code: None,
            city: None,
            county: Some(county.clone()),
            state: Some(state.clone()),
            country: "US".to_string(),
            search_query: format!("{}, {}, US", county, state),
        }
    }

    /// 用于展示和日志的位置标识
    pub fn describe(&self) -> String {
        match self.kind {
            SearchUnitKind::Zip => format!(
                "ZIP: {} ({}, {})",
                self.zip_code.as_deref().unwrap_or("?"),
                self.city.as_deref().unwrap_or("unknown"),
                self.state.as_deref().unwrap_or("unknown"),
            ),
            SearchUnitKind::City => format!(
                "City: {}, {}",
                self.city.as_deref().unwrap_or("?"),
                self.state.as_deref().unwrap_or("?"),
            ),
            SearchUnitKind::County => format!(
                "County: {}, {}",
                self.county.as_deref().unwrap_or("?"),
                self.state.as_deref().unwrap_or("?"),
            ),
        }
    }
}

/// 把名称转成小写连字符形式的slug
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// 州缩写规范化为全称，未知输入原样返回
pub fn normalize_state_name(state: &str) -> String {
    let abbr = state.trim().to_ascii_uppercase();
    let full = match abbr.as_str() {
        "AL" => "Alabama",
        "AK" => "Alaska",
        "AZ" => "Arizona",
        "AR" => "Arkansas",
        "CA" => "California",
        "CO" => "Colorado",
        "CT" => "Connecticut",
        "DE" => "Delaware",
        "FL" => "Florida",
        "GA" => "Georgia",
        "HI" => "Hawaii",
        "ID" => "Idaho",
        "IL" => "Illinois",
        "IN" => "Indiana",
        "IA" => "Iowa",
        "KS" => "Kansas",
        "KY" => "Kentucky",
        "LA" => "Louisiana",
        "ME" => "Maine",
        "MD" => "Maryland",
        "MA" => "Massachusetts",
        "MI" => "Michigan",
        "MN" => "Minnesota",
        "MS" => "Mississippi",
        "MO" => "Missouri",
        "MT" => "Montana",
        "NE" => "Nebraska",
        "NV" => "Nevada",
        "NH" => "New Hampshire",
        "NJ" => "New Jersey",
        "NM" => "New Mexico",
        "NY" => "New York",
        "NC" => "North Carolina",
        "ND" => "North Dakota",
        "OH" => "Ohio",
        "OK" => "Oklahoma",
        "OR" => "Oregon",
        "PA" => "Pennsylvania",
        "RI" => "Rhode Island",
        "SC" => "South Carolina",
        "SD" => "South Dakota",
        "TN" => "Tennessee",
        "TX" => "Texas",
        "UT" => "Utah",
        "VT" => "Vermont",
        "VA" => "Virginia",
        "WA" => "Washington",
        "WV" => "West Virginia",
        "WI" => "Wisconsin",
        "WY" => "Wyoming",
        _ => return state.trim().to_string(),
    };
    full.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_unit_identity_and_query() {
        let unit = SearchUnit::zip(
            "80301",
            Some("Boulder".into()),
            Some("Boulder County".into()),
            Some("Colorado".into()),
        );
        assert_eq!(unit.id, "zip_80301");
        assert_eq!(unit.search_query, "80301, Boulder, Colorado, US");
        assert_eq!(unit.kind, SearchUnitKind::Zip);
    }

    #[test]
    fn test_bare_zip_unit_query() {
        let unit = SearchUnit::zip("04401", None, None, None);
        assert_eq!(unit.search_query, "04401, US");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("New York"), "new-york");
        assert_eq!(slugify("Coeur d'Alene"), "coeur-d-alene");
        assert_eq!(slugify("  Boulder  "), "boulder");
    }

    #[test]
    fn test_normalize_state_name() {
        assert_eq!(normalize_state_name("CO"), "Colorado");
        assert_eq!(normalize_state_name("co"), "Colorado");
        assert_eq!(normalize_state_name("Colorado"), "Colorado");
        assert_eq!(normalize_state_name("Narnia"), "Narnia");
    }
}
