//! Tier routing: mapping a query's time range onto the hot/cold boundary.

use crate::timerange::extract_time_range;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Where a query should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Query only the hot store (recent data).
    HotOnly,
    /// Query only the cold store (archived data).
    ColdOnly,
    /// Query both backends and merge results.
    Both,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HotOnly => "hot_only",
            Self::ColdOnly => "cold_only",
            Self::Both => "both",
        };
        f.write_str(s)
    }
}

/// Determines the query routing target based on time range analysis.
#[derive(Debug, Clone)]
pub struct Router {
    hot_days: i64,
}

impl Router {
    /// Creates a new router with the given hot-window size in days.
    #[must_use]
    pub fn new(hot_days: i64) -> Self {
        Self { hot_days }
    }

    /// Analyzes the query body and decides where to send it.
    #[must_use]
    pub fn route(&self, body: &[u8], timestamp_field: &str) -> RouteTarget {
        self.route_at(body, timestamp_field, Utc::now())
    }

    /// Same as [`Router::route`] with an explicit "now", so the decision is a
    /// pure function of its inputs.
    #[must_use]
    pub fn route_at(&self, body: &[u8], timestamp_field: &str, now: DateTime<Utc>) -> RouteTarget {
        let Some(tr) = extract_time_range(body, timestamp_field) else {
            // Cannot determine time range; query both backends to be safe.
            return RouteTarget::Both;
        };

        let cutoff = now - Duration::days(self.hot_days);

        let (has_hot, has_cold) = match (tr.from, tr.to) {
            (Some(from), Some(to)) => {
                if to < cutoff {
                    (false, true)
                } else if from >= cutoff {
                    (true, false)
                } else {
                    (true, true)
                }
            }
            // Open-ended to the future.
            (Some(from), None) => {
                if from < cutoff {
                    (true, true)
                } else {
                    (true, false)
                }
            }
            // Open-ended to the past.
            (None, Some(to)) => {
                if to < cutoff {
                    (false, true)
                } else {
                    (true, true)
                }
            }
            (None, None) => (true, true),
        };

        match (has_hot, has_cold) {
            (true, true) => RouteTarget::Both,
            (false, true) => RouteTarget::ColdOnly,
            _ => RouteTarget::HotOnly,
        }
    }
}
