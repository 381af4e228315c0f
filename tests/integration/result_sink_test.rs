// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use uuid::Uuid;

use mapharvest::domain::models::listing::{
    ExtractionResult, ExtractionStatus, SkippedLink,
};
use mapharvest::infrastructure::result_sink::{FileResultSink, ResultSink};

fn make_result(url: &str, title: &str, address: &str) -> ExtractionResult {
    let mut data = BTreeMap::new();
    data.insert("title".to_string(), Value::String(title.to_string()));
    data.insert("address".to_string(), Value::String(address.to_string()));
    ExtractionResult {
        url: url.to_string(),
        data,
        errors: BTreeMap::new(),
        status: ExtractionStatus::Ok,
    }
}

/// 测试保存N条结果后读回的JSON与内存中的结果结构一致
#[tokio::test]
async fn test_json_roundtrip_preserves_results() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = FileResultSink::new(tmp.path(), "http://localhost:3001");
    let task_id = Uuid::new_v4();
    let fields = vec!["title".to_string(), "address".to_string()];

    let results = vec![
        make_result("https://maps.example.com/a", "Bounce House", "1 Elm St"),
        make_result("https://maps.example.com/b", "Jump Zone", "2 Oak Ave"),
        make_result("https://maps.example.com/c", "Play World", "3 Pine Rd"),
    ];

    let artifacts = sink.save(task_id, &fields, &results).await.unwrap();
    assert_eq!(artifacts.row_count, 3);

    let json_path = tmp.path().join(format!("results_{}.json", task_id));
    let raw = tokio::fs::read_to_string(json_path).await.unwrap();
    let read_back: Vec<ExtractionResult> = serde_json::from_str(&raw).unwrap();

    assert_eq!(read_back.len(), results.len());
    for (saved, original) in read_back.iter().zip(&results) {
        assert_eq!(saved.url, original.url);
        assert_eq!(saved.data, original.data);
        assert_eq!(saved.status, original.status);
    }
}

/// 测试CSV表头恰好为字段列表加errors列
#[tokio::test]
async fn test_csv_header_is_fields_plus_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = FileResultSink::new(tmp.path(), "http://localhost:3001");
    let task_id = Uuid::new_v4();
    let fields = vec!["title".to_string(), "address".to_string()];

    let results = vec![make_result("https://maps.example.com/a", "Bounce House", "1 Elm St")];
    sink.save(task_id, &fields, &results).await.unwrap();

    let csv_path = tmp.path().join(format!("results_{}.csv", task_id));
    let csv = tokio::fs::read_to_string(csv_path).await.unwrap();
    assert_eq!(csv.lines().next().unwrap(), "title,address,errors");
}

/// 测试校验侧文件包含跳过的链接，主产物不包含
#[tokio::test]
async fn test_verification_file_records_skipped_links() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = FileResultSink::new(tmp.path(), "http://localhost:3001");
    let task_id = Uuid::new_v4();

    let all_results = vec![
        make_result("https://maps.example.com/a", "Bounce House", "1 Elm St"),
        ExtractionResult::skipped("https://maps.example.com/dup"),
    ];
    let skipped = vec![SkippedLink {
        url: "https://maps.example.com/dup".to_string(),
        latitude: 44.8,
        longitude: -68.77,
    }];

    sink.save_verification(task_id, &all_results, &skipped)
        .await
        .unwrap();

    let verify_path = tmp.path().join(format!("verify_{}.json", task_id));
    let raw = tokio::fs::read_to_string(verify_path).await.unwrap();
    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["total_processed"], json!(2));
    assert_eq!(
        body["skipped_duplicates"][0]["url"],
        json!("https://maps.example.com/dup")
    );

    // 主产物只保存非跳过的结果
    let fields = vec!["title".to_string(), "address".to_string()];
    let final_results: Vec<ExtractionResult> = all_results
        .into_iter()
        .filter(|r| r.status == ExtractionStatus::Ok)
        .collect();
    let artifacts = sink.save(task_id, &fields, &final_results).await.unwrap();
    assert_eq!(artifacts.row_count, 1);
}
