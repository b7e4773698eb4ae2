//! Composition of ranked result sets from the two tiers.

use crate::fanout::MergeOptions;
use oqbridge_core::{hit_score, SearchResponse};
use serde_json::Value;

/// Combines search results from two backends with default directives:
/// hits re-sorted by descending score, no pagination.
#[must_use]
pub fn merge(hot: Option<SearchResponse>, cold: Option<SearchResponse>) -> Option<SearchResponse> {
    merge_with_options(hot, cold, &MergeOptions::default())
}

/// Combines search results from two backends under the given directives.
///
/// When one side is absent the other is returned as-is (pagination still
/// applies when directed). Totals are summed, `took` takes the larger value,
/// and hits are stably re-sorted by score.
#[must_use]
pub fn merge_with_options(
    hot: Option<SearchResponse>,
    cold: Option<SearchResponse>,
    opts: &MergeOptions,
) -> Option<SearchResponse> {
    let mut merged = match (hot, cold) {
        (None, None) => return None,
        (Some(h), None) => h,
        (None, Some(c)) => c,
        (Some(h), Some(c)) => combine(h, c),
    };

    sort_hits_by_score(&mut merged.hits.hits, opts.score_asc);

    if opts.paginate {
        paginate(&mut merged, opts.from, opts.size);
    }
    Some(merged)
}

fn combine(hot: SearchResponse, cold: SearchResponse) -> SearchResponse {
    let mut hits = hot.hits.hits;
    hits.extend(cold.hits.hits);

    SearchResponse {
        took: hot.took.max(cold.took),
        timed_out: hot.timed_out || cold.timed_out,
        shards: hot.shards,
        hits: oqbridge_core::HitsEnvelope {
            total: oqbridge_core::TotalHits {
                value: hot.hits.total.value + cold.hits.total.value,
                relation: merge_relation(&hot.hits.total.relation, &cold.hits.total.relation),
            },
            max_score: merge_max_score(hot.hits.max_score, cold.hits.max_score),
            hits,
        },
        aggregations: merge_aggregations(hot.aggregations, cold.aggregations),
    }
}

fn merge_relation(a: &str, b: &str) -> String {
    if a == "gte" || b == "gte" {
        "gte".to_string()
    } else {
        "eq".to_string()
    }
}

fn merge_max_score(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

fn sort_hits_by_score(hits: &mut [Value], ascending: bool) {
    hits.sort_by(|a, b| {
        let sa = hit_score(a);
        let sb = hit_score(b);
        let ord = sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn paginate(resp: &mut SearchResponse, from: usize, size: usize) {
    let page: Vec<Value> = resp
        .hits
        .hits
        .drain(..)
        .skip(from)
        .take(size)
        .collect();

    resp.hits.max_score = page
        .iter()
        .map(hit_score)
        .fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |m| m.max(s)))
        });
    resp.hits.hits = page;
}

/// Shallow merge of aggregation results: the hot backend's values take
/// precedence on key conflicts. When either side is not a JSON object, the
/// hot side is returned untouched.
fn merge_aggregations(hot: Option<Value>, cold: Option<Value>) -> Option<Value> {
    match (hot, cold) {
        (None, cold) => cold,
        (hot, None) => hot,
        (Some(Value::Object(mut hot_map)), Some(Value::Object(cold_map))) => {
            for (key, value) in cold_map {
                hot_map.entry(key).or_insert(value);
            }
            Some(Value::Object(hot_map))
        }
        (Some(hot), Some(_)) => Some(hot),
    }
}
