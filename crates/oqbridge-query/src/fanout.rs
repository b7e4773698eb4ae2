//! Fan-out planning for cross-tier and multi-index merges.
//!
//! Merging two independently ranked result sets is only well-defined for
//! score-based ordering, so the planner either accepts a query and rewrites
//! its pagination, or rejects it with a precise reason that the handler maps
//! to a 400.

use oqbridge_core::{BridgeError, BridgeResult};
use serde_json::Value;

/// Directives for composing backend responses into one client response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Client-requested page offset.
    pub from: usize,
    /// Client-requested page size.
    pub size: usize,
    /// Sort merged hits by ascending score instead of descending.
    pub score_asc: bool,
    /// Whether to slice the merged hits down to the requested page.
    pub paginate: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            from: 0,
            size: 10,
            score_asc: false,
            paginate: false,
        }
    }
}

/// A query body rewritten for fan-out, plus its merge directives.
#[derive(Debug, Clone)]
pub struct FanoutPlan {
    /// Body to send to each backend.
    pub body: Vec<u8>,
    /// How to compose the responses.
    pub merge: MergeOptions,
}

/// Prepares a query body for fan-out merging.
///
/// Only score-based ordering is supported (default sort or an explicit
/// `_score` sort). For `from`/`size` pagination the backend request is
/// rewritten to fetch enough hits (`from = 0`, `size = from + size`) so the
/// merged page is correct. A body that is not valid JSON is passed through
/// unmodified with pagination disabled.
pub fn plan_fanout(body: &[u8]) -> BridgeResult<FanoutPlan> {
    let Ok(mut root) = serde_json::from_slice::<Value>(body) else {
        return Ok(FanoutPlan {
            body: body.to_vec(),
            merge: MergeOptions::default(),
        });
    };
    let Some(map) = root.as_object_mut() else {
        return Ok(FanoutPlan {
            body: body.to_vec(),
            merge: MergeOptions::default(),
        });
    };

    let from = get_usize(map.get("from"), 0);
    let size = get_usize(map.get("size"), 10);

    let Some(score_asc) = parse_score_sort(map.get("sort")) else {
        return Err(BridgeError::unsupported(
            "non-score sort cannot be merged across tiers (only _score ordering)",
        ));
    };

    if map.contains_key("search_after") {
        return Err(BridgeError::unsupported(
            "search_after is not supported for cross-tier merge",
        ));
    }
    if map.contains_key("pit") {
        return Err(BridgeError::unsupported(
            "point-in-time (pit) is not supported for cross-tier merge",
        ));
    }

    let need = if size == 0 { 0 } else { from + size };
    map.insert("from".to_string(), Value::from(0));
    map.insert("size".to_string(), Value::from(need));

    Ok(FanoutPlan {
        body: serde_json::to_vec(&root)?,
        merge: MergeOptions {
            from,
            size,
            score_asc,
            paginate: true,
        },
    })
}

fn get_usize(value: Option<&Value>, default: usize) -> usize {
    match value {
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            // Negative or fractional values clamp to the default behavior.
            .unwrap_or_else(|| if v.is_number() { 0 } else { default }),
        None => default,
    }
}

/// Returns `Some(score_asc)` when the sort specification is score-based,
/// `None` when the query must be rejected.
fn parse_score_sort(sort: Option<&Value>) -> Option<bool> {
    let Some(sort) = sort else {
        return Some(false);
    };
    match sort {
        Value::Null => Some(false),
        Value::String(s) => {
            if s == "_score" {
                Some(false)
            } else {
                None
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => Some(false),
            [single] => parse_score_sort(Some(single)),
            _ => None,
        },
        Value::Object(map) => {
            if map.len() != 1 {
                return None;
            }
            let spec = map.get("_score")?;
            match spec {
                Value::String(order) => Some(order == "asc"),
                Value::Object(inner) => match inner.get("order").and_then(Value::as_str) {
                    Some("asc") => Some(true),
                    _ => Some(false),
                },
                _ => Some(false),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(v: Value) -> BridgeResult<FanoutPlan> {
        plan_fanout(&serde_json::to_vec(&v).unwrap())
    }

    #[test]
    fn test_default_sort_accepted() {
        let p = plan(json!({"query": {"match_all": {}}})).unwrap();
        assert!(p.merge.paginate);
        assert!(!p.merge.score_asc);
        assert_eq!(p.merge.from, 0);
        assert_eq!(p.merge.size, 10);
    }

    #[test]
    fn test_pagination_rewrite() {
        let p = plan(json!({"from": 1, "size": 1, "query": {"match_all": {}}})).unwrap();
        let rewritten: Value = serde_json::from_slice(&p.body).unwrap();
        assert_eq!(rewritten["from"], json!(0));
        assert_eq!(rewritten["size"], json!(2));
        assert_eq!(p.merge.from, 1);
        assert_eq!(p.merge.size, 1);
    }

    #[test]
    fn test_size_zero_fetches_nothing() {
        let p = plan(json!({"from": 5, "size": 0})).unwrap();
        let rewritten: Value = serde_json::from_slice(&p.body).unwrap();
        assert_eq!(rewritten["size"], json!(0));
        assert_eq!(p.merge.size, 0);
    }

    #[test]
    fn test_score_sort_forms_accepted() {
        assert!(!plan(json!({"sort": "_score"})).unwrap().merge.score_asc);
        assert!(!plan(json!({"sort": ["_score"]})).unwrap().merge.score_asc);
        assert!(plan(json!({"sort": {"_score": "asc"}})).unwrap().merge.score_asc);
        assert!(
            plan(json!({"sort": [{"_score": {"order": "asc"}}]}))
                .unwrap()
                .merge
                .score_asc
        );
        assert!(
            !plan(json!({"sort": {"_score": {"order": "desc"}}}))
                .unwrap()
                .merge
                .score_asc
        );
    }

    #[test]
    fn test_field_sort_rejected() {
        let err = plan(json!({"sort": [{"@timestamp": "desc"}]})).unwrap_err();
        assert!(err.to_string().contains("non-score sort"));
    }

    #[test]
    fn test_multi_sort_rejected() {
        assert!(plan(json!({"sort": ["_score", {"@timestamp": "desc"}]})).is_err());
    }

    #[test]
    fn test_search_after_rejected() {
        let err = plan(json!({"search_after": [123], "query": {}})).unwrap_err();
        assert!(err.to_string().contains("search_after"));
    }

    #[test]
    fn test_pit_rejected() {
        let err = plan(json!({"pit": {"id": "abc"}})).unwrap_err();
        assert!(err.to_string().contains("point-in-time"));
    }

    #[test]
    fn test_non_json_body_passes_through_without_pagination() {
        let p = plan_fanout(b"not json at all").unwrap();
        assert_eq!(p.body, b"not json at all");
        assert!(!p.merge.paginate);
    }
}
