use std::collections::HashSet;

use super::models::SeasonUnit;
use crate::arr::models::Episode;

/// Maps one episode to its season unit. Episodes without a series id or a
/// season number cannot be searched at season granularity and yield `None`.
pub fn season_unit(episode: &Episode) -> Option<SeasonUnit> {
    let series_id = episode.series_id?;
    let season_number = episode.season_number?;
    let title = episode
        .series_title()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Series {}", series_id));

    Some(SeasonUnit {
        series_id,
        season_number,
        display_name: format!("{} - Season {}", title, season_number),
    })
}

/// Keeps the first unit seen for each (series, season) pair, in input order.
pub fn dedupe_seasons(units: Vec<SeasonUnit>) -> Vec<SeasonUnit> {
    let mut seen = HashSet::new();
    units
        .into_iter()
        .filter(|unit| seen.insert(unit.key()))
        .collect()
}

/// Collapses already-filtered episodes into one unit per season, preserving
/// first-occurrence order. Round-robin cursors index into this output, so the
/// order must be deterministic for a given input.
pub fn reduce_to_seasons(episodes: &[Episode]) -> Vec<SeasonUnit> {
    dedupe_seasons(episodes.iter().filter_map(season_unit).collect())
}
