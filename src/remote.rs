use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use urlencoding::encode;

use crate::http::{ApiClient, ApiResult};

const ACTIVITY_SEARCH_PATH: &str = "/activitylist-service/activities/search/activities";
const ORIGINAL_DOWNLOAD_PATH: &str = "/download-service/files/activity";
const EXPORT_PATH: &str = "/download-service/export";
const ACTIVITY_PATH: &str = "/activity-service/activity";
const SOCIAL_PROFILE_PATH: &str = "/userprofile-service/socialProfile";

/// Remote-assigned activity identifier. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    /// Returns `None` for the values the remote uses to mean "no id".
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "0" {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn deserialize_activity_id<'de, D>(deserializer: D) -> Result<Option<ActivityId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => ActivityId::new(n.to_string()),
        Some(Value::String(s)) => ActivityId::new(s),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    #[serde(default)]
    pub type_key: Option<String>,
}

/// One entry of the remote activity list. Only the fields fitsync reads are
/// modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(default, deserialize_with = "deserialize_activity_id")]
    pub activity_id: Option<ActivityId>,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub start_time_local: Option<String>,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl ActivityRecord {
    pub fn name(&self) -> &str {
        self.activity_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
    }

    pub fn start_time(&self) -> &str {
        self.start_time_local.as_deref().unwrap_or("")
    }

    pub fn type_key(&self) -> &str {
        self.activity_type
            .as_ref()
            .and_then(|t| t.type_key.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// Original uploaded track file, stored with a .fit extension
    Fit,
    /// Original upload archive, stored as .zip
    Original,
    Tcx,
    Gpx,
    Csv,
    /// Activity detail blob
    Json,
}

impl ArtifactFormat {
    pub const ALL: [ArtifactFormat; 6] = [
        ArtifactFormat::Fit,
        ArtifactFormat::Original,
        ArtifactFormat::Tcx,
        ArtifactFormat::Gpx,
        ArtifactFormat::Csv,
        ArtifactFormat::Json,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Fit => "fit",
            ArtifactFormat::Original => "zip",
            ArtifactFormat::Tcx => "tcx",
            ArtifactFormat::Gpx => "gpx",
            ArtifactFormat::Csv => "csv",
            ArtifactFormat::Json => "json",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactFormat::Fit => "fit",
            ArtifactFormat::Original => "original",
            ArtifactFormat::Tcx => "tcx",
            ArtifactFormat::Gpx => "gpx",
            ArtifactFormat::Csv => "csv",
            ArtifactFormat::Json => "json",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of the vendor API the sync engine and reports depend on.
#[allow(async_fn_in_trait)]
pub trait FitnessApi {
    async fn get_activities(&self, start: usize, limit: usize) -> ApiResult<Vec<ActivityRecord>>;

    /// `Ok(None)` when the remote holds no file for this format.
    async fn download_activity(
        &self,
        id: &ActivityId,
        format: ArtifactFormat,
    ) -> ApiResult<Option<Vec<u8>>>;

    async fn get_activity_details(&self, id: &ActivityId) -> ApiResult<Value>;
}

pub struct HttpFitnessApi {
    client: ApiClient,
}

impl HttpFitnessApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn display_name(&self) -> ApiResult<Option<String>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SocialProfile {
            #[serde(default)]
            display_name: Option<String>,
        }

        let profile: SocialProfile = self.client.get(SOCIAL_PROFILE_PATH).await?;
        Ok(profile.display_name)
    }
}

impl FitnessApi for HttpFitnessApi {
    async fn get_activities(&self, start: usize, limit: usize) -> ApiResult<Vec<ActivityRecord>> {
        let path = format!("{ACTIVITY_SEARCH_PATH}?start={start}&limit={limit}");
        self.client.get(&path).await
    }

    async fn download_activity(
        &self,
        id: &ActivityId,
        format: ArtifactFormat,
    ) -> ApiResult<Option<Vec<u8>>> {
        let id = encode(id.as_str());
        let path = match format {
            ArtifactFormat::Fit | ArtifactFormat::Original => {
                format!("{ORIGINAL_DOWNLOAD_PATH}/{id}")
            }
            ArtifactFormat::Tcx | ArtifactFormat::Gpx | ArtifactFormat::Csv => {
                format!("{EXPORT_PATH}/{}/activity/{id}", format.as_str())
            }
            ArtifactFormat::Json => {
                let details = self.client.get::<Value>(&format!("{ACTIVITY_PATH}/{id}/details")).await?;
                return Ok(details_bytes(&details));
            }
        };
        self.client.get_bytes(&path).await
    }

    async fn get_activity_details(&self, id: &ActivityId) -> ApiResult<Value> {
        let path = format!("{ACTIVITY_PATH}/{}/details", encode(id.as_str()));
        self.client.get(&path).await
    }
}

/// Pretty JSON for a detail blob; `None` when the remote returned nothing useful.
pub fn details_bytes(details: &Value) -> Option<Vec<u8>> {
    match details {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => serde_json::to_vec_pretty(other).ok(),
    }
}
