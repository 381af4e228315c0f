// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::domain::models::location::{
    normalize_state_name, LocationEntry, LocationRules, SearchUnit,
};
use crate::infrastructure::gazetteer::{Gazetteer, StateRecord};

/// 位置展开器
///
/// 把声明式的地理范围规则展开成扁平有序的搜索单元列表。
/// 能下钻到ZIP粒度就下钻，地名录缺少更细数据时回退到
/// 城市或县粒度。展开顺序：base 去重 → 减去 exclude 的
/// 身份键 → 并回 include（include 覆盖 exclude）。
pub fn expand(gazetteer: &Gazetteer, rules: &LocationRules) -> Vec<SearchUnit> {
    let base = expand_entries(gazetteer, &rules.base);
    let exclude_ids: HashSet<String> = expand_entries(gazetteer, &rules.exclude)
        .into_iter()
        .map(|u| u.id)
        .collect();
    let include = expand_entries(gazetteer, &rules.include);

    let mut units: Vec<SearchUnit> = Vec::with_capacity(base.len());
    let mut ids: HashSet<String> = HashSet::new();

    for unit in base {
        if exclude_ids.contains(&unit.id) {
            continue;
        }
        if ids.insert(unit.id.clone()) {
            units.push(unit);
        }
    }
    for unit in include {
        if ids.insert(unit.id.clone()) {
            units.push(unit);
        }
    }

    info!(
        base = rules.base.len(),
        excluded = exclude_ids.len(),
        included = rules.include.len(),
        units = units.len(),
        "Location rules expanded"
    );
    units
}

/// 展开一组条目并按身份键去重（保留首次出现的顺序）
fn expand_entries(gazetteer: &Gazetteer, entries: &[LocationEntry]) -> Vec<SearchUnit> {
    let mut units = Vec::new();
    let mut ids = HashSet::new();
    for entry in entries {
        for unit in expand_entry(gazetteer, entry) {
            if ids.insert(unit.id.clone()) {
                units.push(unit);
            }
        }
    }
    units
}

/// 展开单个条目
///
/// country → 全部州；state → 州内全部城市的ZIP；
/// county → 县内城市的ZIP；city → 该市ZIP；zip → 自身。
/// 未知或缺字段的条目记录警告后丢弃，不中断展开。
fn expand_entry(gazetteer: &Gazetteer, entry: &LocationEntry) -> Vec<SearchUnit> {
    match entry.kind.to_ascii_lowercase().as_str() {
        "country" => gazetteer
            .state_slugs()
            .iter()
            .flat_map(|slug| expand_state(gazetteer, &title_case(slug)))
            .collect(),
        "state" => match &entry.name {
            Some(name) => expand_state(gazetteer, &normalize_state_name(name)),
            None => {
                warn!("State entry missing name, dropped");
                Vec::new()
            }
        },
        "county" => match (&entry.name, &entry.state) {
            (Some(county), Some(state)) => {
                expand_county(gazetteer, county, &normalize_state_name(state))
            }
            _ => {
                warn!(name = ?entry.name, "County entry missing name or state, dropped");
                Vec::new()
            }
        },
        "city" => match (&entry.name, &entry.state) {
            (Some(city), Some(state)) => {
                expand_city(gazetteer, city, &normalize_state_name(state))
            }
            _ => {
                warn!(name = ?entry.name, "City entry missing name or state, dropped");
                Vec::new()
            }
        },
        "zip" => match &entry.zip_code {
            Some(zip) => {
                let state = entry.state.as_deref().map(normalize_state_name);
                vec![SearchUnit::zip(zip.trim(), None, None, state)]
            }
            None => {
                warn!("Zip entry missing zip_code, dropped");
                Vec::new()
            }
        },
        other => {
            warn!(kind = %other, "Unknown location entry type, dropped");
            Vec::new()
        }
    }
}

fn expand_state(gazetteer: &Gazetteer, state_name: &str) -> Vec<SearchUnit> {
    let Some(record) = gazetteer.state(state_name) else {
        warn!(state = %state_name, "State not found in gazetteer, dropped");
        return Vec::new();
    };
    expand_state_record(record, state_name)
}

fn expand_state_record(record: &StateRecord, state_name: &str) -> Vec<SearchUnit> {
    let mut units = Vec::new();
    for (county, city, zips) in record.iter_city_zips() {
        units.extend(city_units(county, city, zips, state_name));
    }
    units
}

fn expand_county(gazetteer: &Gazetteer, county_name: &str, state_name: &str) -> Vec<SearchUnit> {
    let Some(record) = gazetteer.state(state_name) else {
        warn!(state = %state_name, "State not found in gazetteer, dropped");
        return Vec::new();
    };
    let Some(cities) = record.county_cities(county_name) else {
        warn!(county = %county_name, state = %state_name, "County not found in gazetteer, dropped");
        return Vec::new();
    };
    if cities.is_empty() {
        // 县下无城市数据，回退到县粒度
        return vec![SearchUnit::county(county_name, state_name)];
    }
    let mut units = Vec::new();
    for (city, zips) in cities {
        units.extend(city_units(county_name, city, zips, state_name));
    }
    units
}

fn expand_city(gazetteer: &Gazetteer, city_name: &str, state_name: &str) -> Vec<SearchUnit> {
    let Some(record) = gazetteer.state(state_name) else {
        warn!(state = %state_name, "State not found in gazetteer, dropped");
        return Vec::new();
    };
    match record.city_zips(city_name) {
        Some((county, city, zips)) => city_units(county, city, zips, state_name),
        None => {
            // 地名录没有该市的ZIP数据，回退到城市粒度
            vec![SearchUnit::city(city_name, state_name)]
        }
    }
}

/// 某个城市的搜索单元：有ZIP出ZIP单元，无ZIP回退城市单元
fn city_units(county: &str, city: &str, zips: &[String], state_name: &str) -> Vec<SearchUnit> {
    if zips.is_empty() {
        return vec![SearchUnit::city(city, state_name)];
    }
    zips.iter()
        .map(|zip| {
            SearchUnit::zip(
                zip.clone(),
                Some(city.to_string()),
                Some(county.to_string()),
                Some(state_name.to_string()),
            )
        })
        .collect()
}

/// 把小写slug还原成标题大小写的州名
fn title_case(slug: &str) -> String {
    slug.split(['-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_gazetteer() -> Gazetteer {
        let value = json!({
            "colorado": {
                "Boulder County": {
                    "Boulder": ["80301", "80302"]
                },
                "Denver County": {
                    "Denver": ["80201", "80202"]
                }
            },
            "maine": {
                "Penobscot County": {
                    "Bangor": ["04401", "04402"]
                }
            }
        });
        Gazetteer::from_json(&value).unwrap()
    }

    fn entry(kind: &str, name: Option<&str>, zip: Option<&str>, state: Option<&str>) -> LocationEntry {
        LocationEntry {
            kind: kind.to_string(),
            name: name.map(String::from),
            zip_code: zip.map(String::from),
            state: state.map(String::from),
        }
    }

    #[test]
    fn test_single_zip_entry_expands_to_one_unit() {
        let rules = LocationRules {
            base: vec![entry("zip", None, Some("04401"), None)],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "zip_04401");
    }

    #[test]
    fn test_state_expands_to_all_zips() {
        let rules = LocationRules {
            base: vec![entry("state", Some("Colorado"), None, None)],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["zip_80301", "zip_80302", "zip_80201", "zip_80202"]);
    }

    #[test]
    fn test_state_abbreviation_normalized() {
        let rules = LocationRules {
            base: vec![entry("state", Some("ME"), None, None)],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].state.as_deref(), Some("Maine"));
    }

    #[test]
    fn test_exclude_then_include_overrides() {
        // 整州减去Boulder县，再强制加回80301
        let rules = LocationRules {
            base: vec![entry("state", Some("Colorado"), None, None)],
            exclude: vec![entry("county", Some("Boulder County"), None, Some("Colorado"))],
            include: vec![entry("zip", None, Some("80301"), None)],
        };
        let units = expand(&sample_gazetteer(), &rules);
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert!(ids.contains(&"zip_80201"));
        assert!(ids.contains(&"zip_80301"));
        assert!(!ids.contains(&"zip_80302"));
    }

    #[test]
    fn test_country_expands_all_states() {
        let rules = LocationRules {
            base: vec![entry("country", Some("US"), None, None)],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        assert_eq!(units.len(), 6);
    }

    #[test]
    fn test_malformed_entries_dropped() {
        let rules = LocationRules {
            base: vec![
                entry("state", None, None, None),
                entry("galaxy", Some("Andromeda"), None, None),
                entry("zip", None, Some("80301"), None),
            ],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "zip_80301");
    }

    #[test]
    fn test_city_without_zip_data_falls_back() {
        let value = json!({
            "wyoming": {
                "Teton County": {
                    "Jackson": []
                }
            }
        });
        let g = Gazetteer::from_json(&value).unwrap();
        let rules = LocationRules {
            base: vec![entry("city", Some("Jackson"), None, Some("WY"))],
            ..Default::default()
        };
        let units = expand(&g, &rules);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "city_jackson_wyoming");
        assert_eq!(units[0].search_query, "Jackson, Wyoming, US");
    }

    #[test]
    fn test_duplicate_base_entries_deduplicated() {
        let rules = LocationRules {
            base: vec![
                entry("zip", None, Some("80301"), None),
                entry("city", Some("Boulder"), None, Some("CO")),
            ],
            ..Default::default()
        };
        let units = expand(&sample_gazetteer(), &rules);
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["zip_80301", "zip_80302"]);
    }
}
