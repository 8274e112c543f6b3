use async_trait::async_trait;
use serde_json::json;

use super::client::{ArrClient, DEFAULT_TIMEOUT};
use super::error::ArrError;
use super::models::Movie;
use crate::search::{MovieUnit, QueueKind, SearchSource};

const WANTED_MISSING_PATH: &str = "/api/v3/wanted/missing";
const WANTED_CUTOFF_PATH: &str = "/api/v3/wanted/cutoff";
const COMMAND_PATH: &str = "/api/v3/command";

#[derive(Clone)]
pub struct RadarrClient {
    inner: ArrClient,
}

impl RadarrClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ArrError> {
        Ok(Self::from_client(ArrClient::new(
            "Radarr",
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

    pub async fn wanted_missing(&self) -> Result<Vec<Movie>, ArrError> {
        self.inner.get_paginated(WANTED_MISSING_PATH, &[]).await
    }

    /// Movies on disk below their quality profile's cutoff.
    pub async fn wanted_cutoff(&self) -> Result<Vec<Movie>, ArrError> {
        self.inner.get_paginated(WANTED_CUTOFF_PATH, &[]).await
    }

    pub async fn search_movies(&self, movie_ids: &[i64]) -> Result<(), ArrError> {
        self.inner
            .post_json(
                COMMAND_PATH,
                &json!({ "name": "MoviesSearch", "movieIds": movie_ids }),
            )
            .await
    }

    pub async fn validate_connection(&self) -> bool {
        self.inner.validate_connection().await
    }
}

#[async_trait]
impl SearchSource for RadarrClient {
    type Item = Movie;
    type Unit = MovieUnit;

    async fn fetch_candidates(&self, queue: QueueKind) -> Result<Vec<Movie>, ArrError> {
        match queue {
            QueueKind::Missing => self.wanted_missing().await,
            QueueKind::Cutoff => self.wanted_cutoff().await,
        }
    }

    async fn trigger_search(&self, unit: &MovieUnit) -> Result<(), ArrError> {
        self.search_movies(&[unit.movie_id]).await
    }
}
