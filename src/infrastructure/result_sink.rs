// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::listing::{ExtractionResult, ExtractionStatus, SkippedLink};
use crate::utils::errors::SinkError;

/// 落盘产物
#[derive(Debug, Clone)]
pub struct SavedArtifacts {
    /// CSV下载链接
    pub csv_url: String,
    /// JSON下载链接
    pub json_url: String,
    /// 写入的结果行数
    pub row_count: u64,
}

/// 结果落盘特质
///
/// JSON为权威产物，CSV是其扁平化视图。
/// 校验侧文件单独保存，不进入用户可见结果。
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 持久化任务结果，返回下载链接与行数
    async fn save(
        &self,
        task_id: Uuid,
        fields: &[String],
        results: &[ExtractionResult],
    ) -> Result<SavedArtifacts, SinkError>;

    /// 保存校验侧文件：全部结果（含跳过项）与跳过链接清单
    async fn save_verification(
        &self,
        task_id: Uuid,
        results: &[ExtractionResult],
        skipped: &[SkippedLink],
    ) -> Result<(), SinkError>;
}

/// 文件系统结果落盘
///
/// 在输出目录写 `results_<task_id>.json` / `results_<task_id>.csv`，
/// 下载链接以 base_url 为前缀
pub struct FileResultSink {
    dir: PathBuf,
    base_url: String,
}

impl FileResultSink {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            dir: dir.into(),
            base_url,
        }
    }

    async fn ensure_dir(&self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn save(
        &self,
        task_id: Uuid,
        fields: &[String],
        results: &[ExtractionResult],
    ) -> Result<SavedArtifacts, SinkError> {
        if fields.is_empty() {
            return Err(SinkError::InvalidInput("字段列表为空".to_string()));
        }
        self.ensure_dir().await?;

        let json_name = format!("results_{}.json", task_id);
        let csv_name = format!("results_{}.csv", task_id);

        let json_body = serde_json::to_vec_pretty(results)?;
        tokio::fs::write(self.path_for(&json_name), json_body).await?;

        let csv_body = render_csv(fields, results);
        tokio::fs::write(self.path_for(&csv_name), csv_body).await?;

        info!(
            task_id = %task_id,
            rows = results.len(),
            "Results persisted to disk"
        );

        Ok(SavedArtifacts {
            csv_url: self.url_for(&csv_name),
            json_url: self.url_for(&json_name),
            row_count: results.len() as u64,
        })
    }

    async fn save_verification(
        &self,
        task_id: Uuid,
        results: &[ExtractionResult],
        skipped: &[SkippedLink],
    ) -> Result<(), SinkError> {
        self.ensure_dir().await?;
        let body = serde_json::json!({
            "task_id": task_id,
            "total_processed": results.len(),
            "skipped_duplicates": skipped,
            "results": results,
        });
        let name = format!("verify_{}.json", task_id);
        tokio::fs::write(self.path_for(&name), serde_json::to_vec_pretty(&body)?).await?;
        Ok(())
    }
}

/// 把结果渲染成CSV文本
///
/// 表头为请求字段加固定的 errors 列；含逗号、引号或换行的值
/// 按RFC 4180加引号转义。复合值（评论、图片列表）序列化为JSON串。
fn render_csv(fields: &[String], results: &[ExtractionResult]) -> String {
    let mut out = String::new();

    let mut header: Vec<&str> = fields.iter().map(String::as_str).collect();
    header.push("errors");
    write_row(&mut out, header.iter().map(|s| s.to_string()));

    for result in results {
        if result.status == ExtractionStatus::Skipped {
            continue;
        }
        let mut cells: Vec<String> = Vec::with_capacity(fields.len() + 1);
        for field in fields {
            let cell = match result.data.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            cells.push(cell);
        }
        let errors_cell = if result.errors.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&result.errors).unwrap_or_default()
        };
        cells.push(errors_cell);
        write_row(&mut out, cells.into_iter());
    }

    out
}

fn write_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        if cell.contains(['"', ',', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&cell);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn result_with(url: &str, pairs: &[(&str, Value)]) -> ExtractionResult {
        let mut data = BTreeMap::new();
        for (k, v) in pairs {
            data.insert(k.to_string(), v.clone());
        }
        ExtractionResult {
            url: url.to_string(),
            data,
            errors: BTreeMap::new(),
            status: ExtractionStatus::Ok,
        }
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let fields = vec!["title".to_string(), "address".to_string()];
        let mut r = result_with(
            "https://example.com/a",
            &[
                ("title", json!("Joe's \"Best\" Pizza")),
                ("address", json!("1 Main St")),
            ],
        );
        r.errors.insert("phone".into(), "selector timeout".into());

        let csv = render_csv(&fields, &[r]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "title,address,errors");
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"Joe's \"\"Best\"\" Pizza\",1 Main St,"));
        assert!(row.contains("selector timeout"));
    }

    #[test]
    fn test_csv_complex_values_serialized() {
        let fields = vec!["reviews".to_string()];
        let r = result_with(
            "https://example.com/b",
            &[("reviews", json!([{"reviewer": "Ann", "rating": "5/5"}]))],
        );
        let csv = render_csv(&fields, &[r]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("reviewer"));
        assert!(row.contains("Ann"));
    }

    #[test]
    fn test_csv_excludes_skipped_rows() {
        let fields = vec!["title".to_string()];
        let ok = result_with("https://example.com/a", &[("title", json!("Kept"))]);
        let skipped = ExtractionResult::skipped("https://example.com/b");
        let csv = render_csv(&fields, &[ok, skipped]);
        assert_eq!(csv.lines().count(), 2); // 表头 + 一行
    }

    #[tokio::test]
    async fn test_save_writes_both_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FileResultSink::new(tmp.path(), "http://localhost:3001/");
        let task_id = Uuid::new_v4();
        let fields = vec!["title".to_string()];
        let results = vec![result_with("https://example.com/a", &[("title", json!("X"))])];

        let artifacts = sink.save(task_id, &fields, &results).await.unwrap();
        assert_eq!(artifacts.row_count, 1);
        assert_eq!(
            artifacts.json_url,
            format!("http://localhost:3001/results_{}.json", task_id)
        );

        let json_path = tmp.path().join(format!("results_{}.json", task_id));
        let raw = tokio::fs::read_to_string(json_path).await.unwrap();
        let parsed: Vec<ExtractionResult> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].url, "https://example.com/a");
    }
}
