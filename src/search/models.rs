use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The downstream systems we poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Radarr,
    Sonarr,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Radarr, SourceKind::Sonarr];

    /// Lowercase identifier used in routes, job ids and the state file.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Radarr => "radarr",
            SourceKind::Sonarr => "sonarr",
        }
    }

    /// Name used in log lines and history records.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Radarr => "Radarr",
            SourceKind::Sonarr => "Sonarr",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            SourceKind::Radarr => 7878,
            SourceKind::Sonarr => 8989,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SourceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radarr" => Ok(SourceKind::Radarr),
            "sonarr" => Ok(SourceKind::Sonarr),
            _ => Err(()),
        }
    }
}

/// The two wanted lists every source exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Never acquired.
    Missing,
    /// Acquired below the target quality.
    Cutoff,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Missing => "missing",
            QueueKind::Cutoff => "cutoff",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a single search command can be issued for.
pub trait SearchUnit {
    fn display_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieUnit {
    pub movie_id: i64,
    pub display_name: String,
}

impl SearchUnit for MovieUnit {
    fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// One (series, season) pair; episodic content is searched a season at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonUnit {
    pub series_id: i64,
    pub season_number: i64,
    pub display_name: String,
}

impl SeasonUnit {
    pub fn key(&self) -> (i64, i64) {
        (self.series_id, self.season_number)
    }
}

impl SearchUnit for SeasonUnit {
    fn display_name(&self) -> &str {
        &self.display_name
    }
}
