//! Wire models for the Radarr/Sonarr v3 API. Only the fields the search
//! engine reads are modelled; everything else in the payload is ignored.

use serde::{Deserialize, Deserializer};

/// Envelope shared by every paginated `wanted/*` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    pub total_records: u64,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    pub version: String,
}

/// `monitored` must be a literal `true`. Anything else, including a missing
/// field or a non-boolean value, reads as not monitored instead of failing the
/// whole page.
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_bool()))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub monitored: Option<bool>,
}

impl Movie {
    pub fn display_name(&self) -> String {
        match (&self.title, self.year) {
            (Some(title), Some(year)) if year > 0 => format!("{} ({})", title, year),
            (Some(title), _) => title.clone(),
            (None, _) => format!("Movie {}", self.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRef {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: i64,
    #[serde(default)]
    pub series_id: Option<i64>,
    #[serde(default)]
    pub season_number: Option<i64>,
    #[serde(default)]
    pub episode_number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    /// Raw value; parsing happens during eligibility filtering so a bad date
    /// only excludes its own episode.
    #[serde(default)]
    pub air_date_utc: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub monitored: Option<bool>,
    #[serde(default)]
    pub series: Option<SeriesRef>,
}

impl Episode {
    pub fn series_title(&self) -> Option<&str> {
        self.series.as_ref().and_then(|s| s.title.as_deref())
    }
}
