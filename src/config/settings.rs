// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含并发、浏览器、抓取默认值、地理编码和输出等所有配置项
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// 并发控制配置
    pub concurrency: ConcurrencySettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 抓取默认值配置
    pub scraping: ScrapingSettings,
    /// 地理编码配置
    pub geocoding: GeocodingSettings,
    /// 地名录配置
    pub gazetteer: GazetteerSettings,
    /// 输出配置
    pub output: OutputSettings,
}

/// 并发控制配置设置
#[derive(Debug, Deserialize, Clone)]
pub struct ConcurrencySettings {
    /// 链接发现工作器数量
    pub link_finder_workers: usize,
    /// 详情提取工作器数量
    pub data_extractor_workers: usize,
}

/// 浏览器配置设置
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    /// 是否无头模式
    pub headless: bool,
    /// 远程调试地址（为空时本地启动）
    pub remote_debugging_url: Option<String>,
    /// 单次请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 页面导航超时时间（秒）
    pub navigation_timeout_secs: u64,
}

/// 抓取默认值配置设置
///
/// 任务配置未给出的选项按此处的默认值解析，
/// 优先级：任务配置 > 此处默认值。解析一次，贯穿整个管道。
#[derive(Debug, Deserialize, Clone)]
pub struct ScrapingSettings {
    /// 默认提取字段
    pub default_fields: Vec<String>,
    /// 单图模式默认值
    pub single_image: bool,
    /// 单个列表最多提取的评论数
    pub max_reviews: usize,
}

/// 地理编码配置设置
#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingSettings {
    /// API端点
    pub endpoint: String,
    /// API密钥
    pub api_key: String,
}

/// 地名录配置设置
#[derive(Debug, Deserialize, Clone)]
pub struct GazetteerSettings {
    /// 嵌套JSON数据文件路径
    pub data_path: String,
}

/// 输出配置设置
#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    /// 结果文件输出目录
    pub dir: String,
    /// 下载链接的基础URL
    pub base_url: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Default concurrency settings
            .set_default("concurrency.link_finder_workers", 5)?
            .set_default("concurrency.data_extractor_workers", 5)?
            // Default browser settings
            .set_default("browser.headless", true)?
            .set_default("browser.request_timeout_secs", 30)?
            .set_default("browser.navigation_timeout_secs", 60)?
            // Default scraping settings
            .set_default(
                "scraping.default_fields",
                vec!["title".to_string(), "address".to_string(), "phone".to_string()],
            )?
            .set_default("scraping.single_image", true)?
            .set_default("scraping.max_reviews", 100)?
            // Default geocoding settings
            .set_default("geocoding.endpoint", "https://api.geoapify.com/v1/geocode/search")?
            .set_default("geocoding.api_key", "")?
            // Default gazetteer settings
            .set_default("gazetteer.data_path", "data/gazetteer.sample.json")?
            // Default output settings
            .set_default("output.dir", "./public")?
            .set_default("output.base_url", "http://localhost:3001")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("MAPHARVEST").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_files() {
        let settings = Settings::new().expect("defaults should load");
        assert_eq!(settings.concurrency.link_finder_workers, 5);
        assert_eq!(settings.concurrency.data_extractor_workers, 5);
        assert!(settings.browser.headless);
        assert_eq!(settings.scraping.max_reviews, 100);
    }
}
