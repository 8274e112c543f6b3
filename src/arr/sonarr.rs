use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::client::{ArrClient, DEFAULT_TIMEOUT};
use super::error::ArrError;
use super::models::Episode;
use crate::search::{QueueKind, SearchSource, SeasonUnit};

const WANTED_MISSING_PATH: &str = "/api/v3/wanted/missing";
const WANTED_CUTOFF_PATH: &str = "/api/v3/wanted/cutoff";
const COMMAND_PATH: &str = "/api/v3/command";

/// Series titles are requested inline so season units get readable names.
const INCLUDE_SERIES: &[(&str, &str)] = &[("includeSeries", "true")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SonarrApiVersion {
    V3,
    V4,
}

impl std::fmt::Display for SonarrApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SonarrApiVersion::V3 => f.write_str("v3"),
            SonarrApiVersion::V4 => f.write_str("v4"),
        }
    }
}

impl SonarrApiVersion {
    /// Sonarr 4.x still serves the v3 routes we use; the major version is
    /// only reported.
    pub fn from_version_string(version: &str) -> Option<Self> {
        let major: u32 = version.split('.').next()?.trim().parse().ok()?;
        Some(if major >= 4 {
            SonarrApiVersion::V4
        } else {
            SonarrApiVersion::V3
        })
    }
}

#[derive(Clone)]
pub struct SonarrClient {
    inner: ArrClient,
}

impl SonarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ArrError> {
        Ok(Self::from_client(ArrClient::new(
            "Sonarr",
            base_url,
            api_key,
            DEFAULT_TIMEOUT,
        )?))
    }

    pub fn from_client(inner: ArrClient) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &ArrClient {
        &self.inner
    }

    pub async fn wanted_missing(&self) -> Result<Vec<Episode>, ArrError> {
        self.inner
            .get_paginated(WANTED_MISSING_PATH, INCLUDE_SERIES)
            .await
    }

    pub async fn wanted_cutoff(&self) -> Result<Vec<Episode>, ArrError> {
        self.inner
            .get_paginated(WANTED_CUTOFF_PATH, INCLUDE_SERIES)
            .await
    }

    pub async fn search_season(&self, series_id: i64, season_number: i64) -> Result<(), ArrError> {
        self.inner
            .post_json(
                COMMAND_PATH,
                &json!({
                    "name": "SeasonSearch",
                    "seriesId": series_id,
                    "seasonNumber": season_number,
                }),
            )
            .await
    }

    pub async fn validate_connection(&self) -> bool {
        self.inner.validate_connection().await
    }

    /// Falls back to v3 when the version cannot be determined.
    pub async fn detect_api_version(&self) -> SonarrApiVersion {
        match self.inner.system_status().await {
            Ok(status) => SonarrApiVersion::from_version_string(&status.version).unwrap_or_else(|| {
                warn!(
                    "Sonarr: Unrecognized version '{}' -- assuming v3",
                    status.version
                );
                SonarrApiVersion::V3
            }),
            Err(err) => {
                warn!("Sonarr: API version detection failed ({}) -- assuming v3", err);
                SonarrApiVersion::V3
            }
        }
    }
}

#[async_trait]
impl SearchSource for SonarrClient {
    type Item = Episode;
    type Unit = SeasonUnit;

    async fn fetch_candidates(&self, queue: QueueKind) -> Result<Vec<Episode>, ArrError> {
        match queue {
            QueueKind::Missing => self.wanted_missing().await,
            QueueKind::Cutoff => self.wanted_cutoff().await,
        }
    }

    async fn trigger_search(&self, unit: &SeasonUnit) -> Result<(), ArrError> {
        self.search_season(unit.series_id, unit.season_number).await
    }
}
