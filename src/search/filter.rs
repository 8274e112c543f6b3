use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::arr::models::{Episode, Movie};

/// Anything carrying a tri-state monitored flag.
pub trait Monitored {
    fn monitored_flag(&self) -> Option<bool>;

    /// Only an explicit `true` counts.
    fn is_monitored(&self) -> bool {
        self.monitored_flag() == Some(true)
    }
}

impl Monitored for Movie {
    fn monitored_flag(&self) -> Option<bool> {
        self.monitored
    }
}

impl Monitored for Episode {
    fn monitored_flag(&self) -> Option<bool> {
        self.monitored
    }
}

pub fn filter_monitored<T: Monitored>(items: Vec<T>) -> Vec<T> {
    items.into_iter().filter(Monitored::is_monitored).collect()
}

/// Parses an air date as UTC. Offsets are honoured; a timestamp without
/// offset is taken to be UTC already, and a bare date means midnight UTC.
/// Date and time may be separated by `T` or a space.
pub fn parse_air_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.len() == 10 {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }

    let normalized = match raw.as_bytes().get(10) {
        Some(b' ') => format!("{}T{}", &raw[..10], &raw[11..]),
        _ => raw.to_string(),
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .map(|naive| naive.and_utc())
}

/// Monitored, with an air date that parses and is not in the future.
pub fn is_episode_eligible(episode: &Episode, now: DateTime<Utc>) -> bool {
    if !episode.is_monitored() {
        return false;
    }
    episode
        .air_date_utc
        .as_deref()
        .and_then(parse_air_date)
        .is_some_and(|aired| aired <= now)
}

pub fn filter_episode_eligibility(episodes: Vec<Episode>, now: DateTime<Utc>) -> Vec<Episode> {
    episodes
        .into_iter()
        .filter(|e| is_episode_eligible(e, now))
        .collect()
}
