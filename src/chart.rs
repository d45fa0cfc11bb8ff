use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

pub static DEFAULT_CHART_URL: &str = "https://quickchart.io/chart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

/// Renders a chart to a PNG file at `out`.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, spec: &ChartSpec, out: &Path) -> Result<()>;
}

/// Talks to a QuickChart-compatible endpoint, which takes a Chart.js config
/// and answers with the image bytes.
pub struct QuickChartRenderer {
    client: Client,
    url: String,
    width: u32,
    height: u32,
}

impl QuickChartRenderer {
    pub fn new(url: &str, width: u32, height: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(QuickChartRenderer {
            client,
            url: url.to_string(),
            width,
            height,
        })
    }
}

#[async_trait]
impl ChartRenderer for QuickChartRenderer {
    async fn render(&self, spec: &ChartSpec, out: &Path) -> Result<()> {
        let body = request_body(spec, self.width, self.height);
        debug!(title = %spec.title, url = %self.url, "rendering chart");
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach chart service at {}", self.url))?
            .error_for_status()
            .context("Chart service rejected the request")?;
        let bytes = resp
            .bytes()
            .await
            .context("Failed to read chart image")?;
        tokio::fs::write(out, &bytes)
            .await
            .with_context(|| format!("Failed to write chart to {}", out.display()))?;
        Ok(())
    }
}

fn request_body(spec: &ChartSpec, width: u32, height: u32) -> Value {
    let datasets: Vec<Value> = spec
        .series
        .iter()
        .map(|s| {
            let mut dataset = json!({ "label": s.label, "data": s.values });
            if spec.kind == ChartKind::Line {
                dataset["fill"] = json!(false);
            }
            dataset
        })
        .collect();

    json!({
        "width": width,
        "height": height,
        "format": "png",
        "backgroundColor": "white",
        "chart": {
            "type": spec.kind,
            "data": {
                "labels": spec.labels,
                "datasets": datasets,
            },
            "options": {
                "title": { "display": true, "text": spec.title },
            },
        },
    })
}
