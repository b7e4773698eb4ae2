//! Time-range extraction from search DSL bodies.
//!
//! The extractor performs a small typed peek into the query instead of
//! modeling the full DSL: a `range` clause on the timestamp field is looked
//! up under `query.range`, `query.bool.filter` and `query.bool.must`, in that
//! order. Everything else in the body is ignored.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// An extracted time range. At least one bound is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound, if present.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound, if present.
    pub to: Option<DateTime<Utc>>,
}

/// Parses a search DSL body and extracts the time range on the given
/// timestamp field. Returns `None` when the body carries no recognizable
/// range clause for that field.
#[must_use]
pub fn extract_time_range(body: &[u8], timestamp_field: &str) -> Option<TimeRange> {
    let root: Value = serde_json::from_slice(body).ok()?;
    let query = root.get("query")?;

    // Top-level "range" directly under "query".
    if let Some(range) = query.get("range") {
        if let Some(tr) = parse_range_clause(range, timestamp_field) {
            return Some(tr);
        }
    }

    let bool_query = query.get("bool")?;

    // "filter" and "must" clauses, each a list or a single object.
    for key in ["filter", "must"] {
        let Some(clause_val) = bool_query.get(key) else {
            continue;
        };
        let clauses: Vec<&Value> = match clause_val {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for clause in clauses {
            if let Some(range) = clause.get("range") {
                if let Some(tr) = parse_range_clause(range, timestamp_field) {
                    return Some(tr);
                }
            }
        }
    }

    None
}

fn parse_range_clause(range: &Value, timestamp_field: &str) -> Option<TimeRange> {
    let bounds = range.get(timestamp_field)?.as_object()?;

    let mut tr = TimeRange {
        from: None,
        to: None,
    };
    for key in ["gte", "gt", "from"] {
        if let Some(parsed) = bounds.get(key).and_then(parse_time_value) {
            tr.from = Some(parsed);
            break;
        }
    }
    for key in ["lte", "lt", "to"] {
        if let Some(parsed) = bounds.get(key).and_then(parse_time_value) {
            tr.to = Some(parsed);
            break;
        }
    }

    if tr.from.is_none() && tr.to.is_none() {
        return None;
    }
    Some(tr)
}

fn parse_time_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Some(t) = parse_now_date_math(s) {
                return Some(t);
            }
            // RFC3339, with or without fractional seconds.
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.with_timezone(&Utc));
            }
            // Bare date-times are implicitly UTC.
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(naive.and_utc());
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
            }
            None
        }
        Value::Number(n) => {
            // Epoch milliseconds.
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

static NOW_DATE_MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^now(?:(?P<op>[+-])(?P<num>\d+)(?P<unit>[smhdwMy]))?(?:\|\|.*)?$")
        .expect("date math regex is valid")
});

/// Parses a small, safe subset of search date math:
/// `now`, `now±N[s|m|h|d|w]`, and `now±N[M|y]` via calendar arithmetic.
/// An optional `||…` rounding suffix is accepted and ignored. Unsupported
/// expressions return `None` so callers can fall back to "unknown".
fn parse_now_date_math(s: &str) -> Option<DateTime<Utc>> {
    let caps = NOW_DATE_MATH_RE.captures(s)?;
    let now = Utc::now();

    let Some(op) = caps.name("op") else {
        return Some(now);
    };
    let n: i64 = caps.name("num")?.as_str().parse().ok()?;
    let unit = caps.name("unit")?.as_str();
    let negative = op.as_str() == "-";

    let result = match unit {
        "s" => Some(shift(now, Duration::seconds(n), negative)),
        "m" => Some(shift(now, Duration::minutes(n), negative)),
        "h" => Some(shift(now, Duration::hours(n), negative)),
        "d" => Some(shift(now, Duration::days(n), negative)),
        "w" => Some(shift(now, Duration::days(7 * n), negative)),
        "M" => shift_months(now, u32::try_from(n).ok()?, negative),
        "y" => shift_months(now, u32::try_from(n.checked_mul(12)?).ok()?, negative),
        _ => None,
    };
    result
}

fn shift(now: DateTime<Utc>, amount: Duration, negative: bool) -> DateTime<Utc> {
    if negative {
        now - amount
    } else {
        now + amount
    }
}

fn shift_months(now: DateTime<Utc>, months: u32, negative: bool) -> Option<DateTime<Utc>> {
    if negative {
        now.checked_sub_months(Months::new(months))
    } else {
        now.checked_add_months(Months::new(months))
    }
}
