// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::domain::models::location::slugify;

/// 美国地名录
///
/// 嵌套JSON数据：州 -> 县 -> 城市 -> ZIP编码数组。
/// 州键为小写slug，县和城市保留原始名称。
/// 位置展开器用它把 country/state/county/city 条目展开到ZIP粒度。
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    states: BTreeMap<String, StateRecord>,
}

/// 单个州的地名数据
#[derive(Debug, Clone, Default)]
pub struct StateRecord {
    /// 县名 -> (城市名 -> ZIP列表)
    counties: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StateRecord {
    /// 该州的所有县名
    pub fn county_names(&self) -> Vec<&str> {
        self.counties.keys().map(String::as_str).collect()
    }

    /// 该州的所有城市名（跨县去重，按名称排序）
    pub fn city_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .counties
            .values()
            .flat_map(|cities| cities.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// 某个县下的城市及其ZIP列表
    pub fn county_cities(&self, county: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.counties.get(county)
    }

    /// 某个城市的ZIP列表及所属县名（城市名不区分大小写匹配）
    pub fn city_zips(&self, city: &str) -> Option<(&str, &str, &[String])> {
        let wanted = slugify(city);
        for (county, cities) in &self.counties {
            for (name, zips) in cities {
                if slugify(name) == wanted {
                    return Some((county.as_str(), name.as_str(), zips.as_slice()));
                }
            }
        }
        None
    }

    /// 遍历该州全部 (县, 城市, ZIP列表)
    pub fn iter_city_zips(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.counties.iter().flat_map(|(county, cities)| {
            cities
                .iter()
                .map(move |(city, zips)| (county.as_str(), city.as_str(), zips.as_slice()))
        })
    }
}

impl Gazetteer {
    /// 从JSON文件加载地名录
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read gazetteer file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse gazetteer JSON: {}", path.display()))?;
        Self::from_json(&value)
    }

    /// 从已解析的JSON值构建地名录
    ///
    /// ZIP条目允许是字符串或数字，统一规范化为字符串；
    /// 形状不符的节点记录警告后跳过，不让单个脏条目毁掉整份数据。
    pub fn from_json(value: &Value) -> Result<Self> {
        let root = value
            .as_object()
            .context("Gazetteer root node must be an object")?;
        let mut states = BTreeMap::new();

        for (state_name, counties_value) in root {
            let Some(counties_obj) = counties_value.as_object() else {
                warn!(state = %state_name, "State entry is not an object, skipping");
                continue;
            };
            let mut record = StateRecord::default();
            for (county_name, cities_value) in counties_obj {
                let Some(cities_obj) = cities_value.as_object() else {
                    warn!(state = %state_name, county = %county_name, "County entry is not an object, skipping");
                    continue;
                };
                let mut cities = BTreeMap::new();
                for (city_name, zips_value) in cities_obj {
                    let Some(zips_arr) = zips_value.as_array() else {
                        warn!(state = %state_name, city = %city_name, "City entry is not an array, skipping");
                        continue;
                    };
                    let zips: Vec<String> = zips_arr
                        .iter()
                        .filter_map(|z| match z {
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        })
                        .collect();
                    cities.insert(city_name.clone(), zips);
                }
                record.counties.insert(county_name.clone(), cities);
            }
            states.insert(slugify(state_name), record);
        }

        Ok(Self { states })
    }

    /// 按州名查找（接受全称，内部按slug匹配）
    pub fn state(&self, state_name: &str) -> Option<&StateRecord> {
        self.states.get(&slugify(state_name))
    }

    /// 全部州的slug列表
    pub fn state_slugs(&self) -> Vec<&str> {
        self.states.keys().map(String::as_str).collect()
    }
}
