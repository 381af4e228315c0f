// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mapharvest::config::settings::GeocodingSettings;
use mapharvest::infrastructure::geocoding::AddressGeocoder;

fn settings_for(server: &MockServer) -> GeocodingSettings {
    GeocodingSettings {
        endpoint: format!("{}/v1/geocode/search", server.uri()),
        api_key: "test-key".to_string(),
    }
}

/// 测试地址文本解析出行政区划
#[tokio::test]
async fn test_address_lookup_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .and(query_param("text", "1 Main St, Bangor"))
        .and(query_param("apiKey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "city": "Bangor",
                "state": "Maine",
                "postcode": "04401"
            }]
        })))
        .mount(&server)
        .await;

    let geocoder = AddressGeocoder::new(&settings_for(&server)).unwrap();
    let location = geocoder.lookup("1 Main St, Bangor").await.unwrap();

    assert_eq!(location.city.as_deref(), Some("Bangor"));
    assert_eq!(location.state.as_deref(), Some("Maine"));
    assert_eq!(location.postcode.as_deref(), Some("04401"));
}

/// 测试首次失败后按固定间隔重试并成功
#[tokio::test]
async fn test_address_lookup_retries_after_failure() {
    let server = MockServer::start().await;
    // 第一次返回500，耗尽后落到成功的mock
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"city": "Boulder", "state": "Colorado", "postcode": "80301"}]
        })))
        .mount(&server)
        .await;

    let geocoder = AddressGeocoder::new(&settings_for(&server)).unwrap();
    let location = geocoder.lookup("2 Oak Ave, Boulder").await.unwrap();
    assert_eq!(location.city.as_deref(), Some("Boulder"));
}

/// 测试空results数组降级为全空的行政区划
#[tokio::test]
async fn test_address_lookup_empty_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let geocoder = AddressGeocoder::new(&settings_for(&server)).unwrap();
    let location = geocoder.lookup("nowhere in particular").await.unwrap();
    assert!(location.city.is_none());
    assert!(location.state.is_none());
    assert!(location.postcode.is_none());
}
