//! Sync gateway: the boundary to the hosted member sheet
//!
//! Reads go through the sheet values API and return the raw grid.
//! Writes are dispatched to a script endpoint over a one-way channel: the
//! response is never inspected, so a dispatch that does not fail at the
//! transport level is only provisionally successful.

use async_trait::async_trait;
use clubcard_common::config::{SourceConfig, SyncConfig};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::{
    mod_key, MemberRecord, Modifications, COLOR_KEY, LOCATION_KEY, MODEL_KEY, NAME_KEY,
    PLATE_KEY, TIMESTAMP_KEY,
};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const USER_AGENT: &str = concat!("clubcard-registry/", env!("CARGO_PKG_VERSION"));

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request never completed (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Source error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(&'static str),
}

/// Write patch for one member row
///
/// Always carries all ten modification slots so a slot can be cleared.
/// Serialises as `{ row, timestamp, name, location, plate, color, model,
/// mod1..mod10 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub row: usize,
    /// Membership start in display form
    pub timestamp: String,
    pub name: String,
    pub location: String,
    pub plate: String,
    pub color: String,
    pub model: String,
    pub modifications: Modifications,
}

impl RecordPatch {
    /// Write the patch values into a record (optimistic local apply)
    pub fn apply_to(&self, record: &mut MemberRecord) {
        record.set_field(TIMESTAMP_KEY, self.timestamp.as_str());
        record.set_field(NAME_KEY, self.name.as_str());
        record.set_field(LOCATION_KEY, self.location.as_str());
        record.set_field(PLATE_KEY, self.plate.as_str());
        record.set_field(COLOR_KEY, self.color.as_str());
        record.set_field(MODEL_KEY, self.model.as_str());
        record.modifications = self.modifications.clone();
    }
}

impl Serialize for RecordPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7 + self.modifications.len()))?;
        map.serialize_entry("row", &self.row)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("location", &self.location)?;
        map.serialize_entry("plate", &self.plate)?;
        map.serialize_entry("color", &self.color)?;
        map.serialize_entry("model", &self.model)?;
        for (slot, value) in self.modifications.iter().enumerate() {
            map.serialize_entry(&mod_key(slot).to_lowercase(), value)?;
        }
        map.end()
    }
}

/// Insights as served by the script endpoint (`?action=getInsights`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteInsights {
    pub success: bool,
    #[serde(default)]
    pub insights: String,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

/// Access to the backing store
#[async_trait]
pub trait SyncGateway: Send + Sync {
    /// Fetch the full grid: row 0 is the header, rows 1..N are data
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, GatewayError>;

    /// Dispatch a patch. `Ok` only means the request left without a
    /// transport failure; the remote outcome is unknown.
    async fn write(&self, patch: &RecordPatch) -> Result<(), GatewayError>;

    /// Fetch remotely computed insights, `None` when no source is configured
    async fn fetch_insights(&self) -> Result<Option<RemoteInsights>, GatewayError> {
        Ok(None)
    }
}

/// Sheet values API response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// HTTP gateway: sheet values API for reads, script endpoint for writes
pub struct HttpGateway {
    http_client: reqwest::Client,
    sheet_id: Option<String>,
    api_key: Option<String>,
    range: String,
    script_url: Option<String>,
}

impl HttpGateway {
    pub fn new(source: &SourceConfig, sync: &SyncConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(sync.request_timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            sheet_id: source.sheet_id.clone(),
            api_key: source.api_key.clone(),
            range: format!("{}!{}", source.sheet_name, source.range_columns),
            script_url: sync.script_url.clone(),
        })
    }

    /// Values endpoint URL for the configured sheet and range
    fn values_url(&self) -> Result<reqwest::Url, GatewayError> {
        let sheet_id = self
            .sheet_id
            .as_deref()
            .ok_or(GatewayError::NotConfigured("source.sheet_id"))?;

        let mut url = reqwest::Url::parse(SHEETS_BASE_URL)
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Parse("sheets base URL cannot be a base".to_string()))?
            .push(sheet_id)
            .push("values")
            .push(&self.range);
        Ok(url)
    }

    fn script_url(&self) -> Result<&str, GatewayError> {
        self.script_url
            .as_deref()
            .ok_or(GatewayError::NotConfigured("sync.script_url"))
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, GatewayError> {
        let url = self.values_url()?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("source.api_key"))?;

        debug!(url = %url, "Fetching member sheet");

        let response = self
            .http_client
            .get(url)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status(status.as_u16(), error_text));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(body.values)
    }

    async fn write(&self, patch: &RecordPatch) -> Result<(), GatewayError> {
        let url = self.script_url()?;

        let response = self
            .http_client
            .post(url)
            .json(patch)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // The channel is one-way: a non-success status is logged, not failed
        let status = response.status();
        if status.is_success() {
            info!(row = patch.row, plate = %patch.plate, "Member update dispatched");
        } else {
            warn!(
                row = patch.row,
                status = status.as_u16(),
                "Member update dispatched, endpoint answered with non-success status"
            );
        }
        Ok(())
    }

    async fn fetch_insights(&self) -> Result<Option<RemoteInsights>, GatewayError> {
        let Some(url) = self.script_url.as_deref() else {
            return Ok(None);
        };

        let response = self
            .http_client
            .get(url)
            .query(&[("action", "getInsights")])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status(status.as_u16(), error_text));
        }

        let insights = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        Ok(Some(insights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patch() -> RecordPatch {
        let mut modifications = Modifications::default();
        modifications[0] = "Intake".to_string();
        RecordPatch {
            row: 7,
            timestamp: "Apr 18, 25".to_string(),
            name: "Aisyah".to_string(),
            location: "Selangor".to_string(),
            plate: "WXY 1234".to_string(),
            color: "black".to_string(),
            model: "IS300".to_string(),
            modifications,
        }
    }

    #[test]
    fn test_patch_serialises_all_slots() {
        let json = serde_json::to_value(sample_patch()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 17);
        assert_eq!(json["row"], 7);
        assert_eq!(json["timestamp"], "Apr 18, 25");
        assert_eq!(json["plate"], "WXY 1234");
        assert_eq!(json["mod1"], "Intake");
        assert_eq!(json["mod10"], "");
    }

    #[test]
    fn test_patch_apply_overwrites_scalars_and_slots() {
        let mut record = MemberRecord::default();
        record.set_field(NAME_KEY, "Old");
        record.set_field("Extra", "kept");
        record.modifications[5] = "Old mod".to_string();

        sample_patch().apply_to(&mut record);

        assert_eq!(record.field(NAME_KEY), "Aisyah");
        assert_eq!(record.field(TIMESTAMP_KEY), "Apr 18, 25");
        assert_eq!(record.field("Extra"), "kept");
        assert_eq!(record.modifications[0], "Intake");
        assert_eq!(record.modifications[5], "");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let source = SourceConfig {
            sheet_id: Some("sheet-1".to_string()),
            ..SourceConfig::default()
        };
        let gateway = HttpGateway::new(&source, &SyncConfig::default()).unwrap();

        let url = gateway.values_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Members%20List!A:Q"
        );
    }

    #[test]
    fn test_unconfigured_endpoints() {
        let gateway = HttpGateway::new(&SourceConfig::default(), &SyncConfig::default()).unwrap();

        assert!(matches!(
            gateway.values_url(),
            Err(GatewayError::NotConfigured("source.sheet_id"))
        ));
        assert!(matches!(
            gateway.script_url(),
            Err(GatewayError::NotConfigured("sync.script_url"))
        ));
    }

    #[tokio::test]
    async fn test_insights_without_script_url_is_none() {
        let gateway = HttpGateway::new(&SourceConfig::default(), &SyncConfig::default()).unwrap();
        assert!(gateway.fetch_insights().await.unwrap().is_none());
    }
}
