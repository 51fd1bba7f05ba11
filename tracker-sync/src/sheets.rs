use crate::config::SheetsConfig;
use crate::error::{SyncError, SyncResult};
use crate::source::{Row, SourceReader};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Google Sheets `values.get` reader. The first row is the header.
pub struct SheetsClient {
    client: Client,
    config: SheetsConfig
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(SyncError::HttpError)?;

        Ok(Self { client, config })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.spreadsheet_id),
            urlencoding::encode(range)
        )
    }
}

fn rows_from_values(values: Vec<Vec<String>>) -> Vec<Row> {
    let mut lines = values.into_iter();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    lines
        .map(|cells| {
            header
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.trim().is_empty())
                .map(|(i, name)| (name.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

#[async_trait]
impl SourceReader for SheetsClient {
    async fn fetch_rows(&self, sheet: &str) -> SyncResult<Vec<Row>> {
        let url = self.values_url(sheet);
        debug!(url = %url, "Fetching sheet values");

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.json::<ValueRange>().await?;
                Ok(rows_from_values(body.values))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                SyncError::AuthenticationError("Sheets credentials rejected".to_string())
            ),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::SourceError(format!(
                    "sheet fetch failed with {}: {}",
                    status.as_u16(),
                    body
                )))
            }
        }
    }
}
