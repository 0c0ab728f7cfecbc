use appraisal_types::{PartResult, PartsSearch, PartsSearchOp, SearchRecord};
use serde_json::Value;
use tracing::{debug, warn};

pub(crate) fn apply(parts: &mut PartsSearch, op: &PartsSearchOp) {
    match op {
        PartsSearchOp::RecordSearch {
            search_id,
            query,
            results,
        } => record_search(parts, search_id, query, results),
        PartsSearchOp::Select { part_ids } => {
            for id in part_ids {
                move_part(&mut parts.unselected, &mut parts.selected, id);
            }
        }
        PartsSearchOp::Deselect { part_ids } => {
            for id in part_ids {
                move_part(&mut parts.selected, &mut parts.unselected, id);
            }
        }
        PartsSearchOp::Clear => {
            *parts = PartsSearch::default();
        }
    }
    parts.refresh_summary();
}

fn record_search(parts: &mut PartsSearch, search_id: &str, query: &Value, results: &[PartResult]) {
    for result in results {
        if parts.is_selected(&result.id) {
            continue;
        }
        match parts.unselected.iter_mut().find(|p| p.id == result.id) {
            Some(existing) => *existing = result.clone(),
            None => parts.unselected.push(result.clone()),
        }
    }

    if !search_id.is_empty() && parts.has_search(search_id) {
        debug!(search_id, "search already recorded");
        return;
    }
    parts.history.push(SearchRecord {
        id: search_id.to_string(),
        query: query.clone(),
        results_count: results.len(),
    });
    parts.summary.total_searches += 1;
    parts.summary.total_results += results.len() as u64;
    parts.summary.last_search = describe_query(query);
}

fn describe_query(query: &Value) -> String {
    match query {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn move_part(from: &mut Vec<PartResult>, to: &mut Vec<PartResult>, id: &str) {
    match from.iter().position(|p| p.id == id) {
        Some(pos) => {
            let part = from.remove(pos);
            if !to.iter().any(|p| p.id == id) {
                to.push(part);
            }
        }
        None if to.iter().any(|p| p.id == id) => {}
        None => warn!(part_id = id, "part not found in parts search"),
    }
}
