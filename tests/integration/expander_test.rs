// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use mapharvest::domain::models::location::{LocationEntry, LocationRules};
use mapharvest::infrastructure::gazetteer::Gazetteer;
use mapharvest::pipeline::expander;

fn load_sample() -> Gazetteer {
    Gazetteer::load("data/gazetteer.sample.json").expect("sample gazetteer loads")
}

fn zip_entry(zip: &str) -> LocationEntry {
    LocationEntry {
        kind: "zip".to_string(),
        name: None,
        zip_code: Some(zip.to_string()),
        state: None,
    }
}

/// 测试单个ZIP条目恰好产出一个搜索单元
#[test]
fn test_single_zip_produces_one_unit() {
    let gazetteer = load_sample();
    let rules = LocationRules {
        base: vec![zip_entry("04401")],
        ..Default::default()
    };

    let units = expander::expand(&gazetteer, &rules);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].id, "zip_04401");
    assert_eq!(units[0].search_query, "04401, US");
}

/// 测试州展开经过排除与强制包含后的集合运算
#[test]
fn test_state_with_exclude_and_include() {
    let gazetteer = load_sample();
    let rules = LocationRules {
        base: vec![LocationEntry {
            kind: "state".to_string(),
            name: Some("CO".to_string()),
            zip_code: None,
            state: None,
        }],
        exclude: vec![zip_entry("80302"), zip_entry("80202")],
        include: vec![zip_entry("80302")],
    };

    let units = expander::expand(&gazetteer, &rules);
    let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    assert!(ids.contains(&"zip_80301"));
    assert!(ids.contains(&"zip_80201"));
    assert!(ids.contains(&"zip_80302"), "include overrides exclude");
    assert!(!ids.contains(&"zip_80202"));
}

/// 测试ZIP单元携带完整的搜索查询串
#[test]
fn test_zip_units_carry_constructed_queries() {
    let gazetteer = load_sample();
    let rules = LocationRules {
        base: vec![LocationEntry {
            kind: "city".to_string(),
            name: Some("Bangor".to_string()),
            zip_code: None,
            state: Some("Maine".to_string()),
        }],
        ..Default::default()
    };

    let units = expander::expand(&gazetteer, &rules);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].search_query, "04401, Bangor, Maine, US");
    assert_eq!(units[1].search_query, "04402, Bangor, Maine, US");
}
