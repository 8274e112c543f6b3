//! The per-source pieces the generic cycle is parameterized by.

use chrono::{DateTime, Utc};

use super::filter::{filter_episode_eligibility, filter_monitored};
use super::models::{MovieUnit, SearchUnit, SeasonUnit};
use super::seasons::reduce_to_seasons;
use crate::arr::models::{Episode, Movie};

/// How a source's raw candidates become search units.
///
/// Eligibility filtering always happens before any reduction, so the
/// round-robin cursor indexes the reduced, eligible list.
pub trait SearchStrategy: Send + Sync {
    type Item: Send + Sync;
    type Unit: SearchUnit + Send + Sync;

    /// Ordered, deterministic for a given input.
    fn build_units(&self, items: Vec<Self::Item>, now: DateTime<Utc>) -> Vec<Self::Unit>;
}

/// One search per monitored movie.
#[derive(Debug, Default, Clone, Copy)]
pub struct MovieStrategy;

impl SearchStrategy for MovieStrategy {
    type Item = Movie;
    type Unit = MovieUnit;

    fn build_units(&self, items: Vec<Movie>, _now: DateTime<Utc>) -> Vec<MovieUnit> {
        filter_monitored(items)
            .into_iter()
            .map(|movie| MovieUnit {
                display_name: movie.display_name(),
                movie_id: movie.id,
            })
            .collect()
    }
}

/// One search per season that has at least one aired, monitored episode.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeasonStrategy;

impl SearchStrategy for SeasonStrategy {
    type Item = Episode;
    type Unit = SeasonUnit;

    fn build_units(&self, items: Vec<Episode>, now: DateTime<Utc>) -> Vec<SeasonUnit> {
        reduce_to_seasons(&filter_episode_eligibility(items, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::models::SeriesRef;
    use chrono::Duration;

    #[test]
    fn movie_strategy_keeps_monitored_movies_in_order() {
        let movies = vec![
            Movie {
                id: 1,
                title: Some("A".into()),
                year: Some(2000),
                monitored: Some(true),
            },
            Movie {
                id: 2,
                title: Some("B".into()),
                year: None,
                monitored: Some(false),
            },
            Movie {
                id: 3,
                title: None,
                year: None,
                monitored: Some(true),
            },
        ];

        let units = MovieStrategy.build_units(movies, Utc::now());

        assert_eq!(
            units,
            vec![
                MovieUnit {
                    movie_id: 1,
                    display_name: "A (2000)".into()
                },
                MovieUnit {
                    movie_id: 3,
                    display_name: "Movie 3".into()
                },
            ]
        );
    }

    #[test]
    fn season_strategy_filters_before_reducing() {
        let now = Utc::now();
        let past = (now - Duration::days(3)).to_rfc3339();
        let future = (now + Duration::days(3)).to_rfc3339();
        let ep = |id: i64, season: i64, air: &str, monitored: bool| Episode {
            id,
            series_id: Some(1),
            season_number: Some(season),
            air_date_utc: Some(air.to_string()),
            monitored: Some(monitored),
            series: Some(SeriesRef {
                title: Some("Show".into()),
            }),
            ..Default::default()
        };

        // Season 2 only has an unaired and an unmonitored episode.
        let episodes = vec![
            ep(1, 2, future.as_str(), true),
            ep(2, 1, past.as_str(), true),
            ep(3, 2, past.as_str(), false),
            ep(4, 1, past.as_str(), true),
            ep(5, 3, past.as_str(), true),
        ];

        let units = SeasonStrategy.build_units(episodes, now);

        let keys: Vec<(i64, i64)> = units.iter().map(SeasonUnit::key).collect();
        assert_eq!(keys, vec![(1, 1), (1, 3)]);
    }
}
