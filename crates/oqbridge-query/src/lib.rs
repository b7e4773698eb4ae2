//! Query-side decision logic for the bridge: time-range extraction from the
//! search DSL, tier routing, fan-out planning, and cross-tier response
//! merging. Everything in this crate is pure with respect to I/O, so the
//! proxy handler and the migration driver can be tested against it directly.

pub mod fanout;
pub mod glob;
pub mod merger;
pub mod router;
pub mod timerange;

pub use fanout::{plan_fanout, FanoutPlan, MergeOptions};
pub use glob::{contains_wildcard, has_internal, has_wildcard, matches_pattern};
pub use merger::{merge, merge_with_options};
pub use router::{RouteTarget, Router};
pub use timerange::{extract_time_range, TimeRange};
