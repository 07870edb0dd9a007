//! Two-stage hierarchical routing: pick a group, then rank within it.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/router.py`. Stage A
//! aggregates hybrid scores by group and reports a confidence ratio; stage B
//! re-runs hybrid search constrained to the winning group.

use crate::gateway::models::{Group, GroupRoute, ToolRecord, ToolScore};
use crate::gateway::retrieval::{HybridRetriever, Retriever};
use std::collections::HashMap;

pub struct HierarchicalRouter<'a> {
    records: &'a [ToolRecord],
    retriever: HybridRetriever<'a>,
    group_top_k: usize,
    tool_top_k: usize,
}

impl<'a> HierarchicalRouter<'a> {
    pub fn new(records: &'a [ToolRecord]) -> Self {
        Self::with_limits(records, 1, 8)
    }

    pub fn with_limits(records: &'a [ToolRecord], group_top_k: usize, tool_top_k: usize) -> Self {
        Self {
            records,
            retriever: HybridRetriever::new(records),
            group_top_k,
            tool_top_k,
        }
    }

    fn get_record(&self, tool_id: &str) -> Option<&ToolRecord> {
        self.records.iter().find(|r| r.tool_id == tool_id)
    }

    /// Stage A: aggregate hybrid scores by group, pick the highest-scoring
    /// one, confidence = its share of the total aggregated score.
    pub fn route_group(&self, query: &str) -> GroupRoute {
        let pool = self.tool_top_k.max(12);
        let candidates = self.retriever.search(query, None, pool);
        if candidates.is_empty() {
            return GroupRoute {
                group: Group::Other,
                reason: "no matching tools".to_string(),
                confidence: 0.0,
            };
        }

        let mut score_by_group: HashMap<Group, f64> = HashMap::new();
        for candidate in &candidates {
            if let Some(record) = self.get_record(&candidate.tool_id) {
                *score_by_group.entry(record.group).or_insert(0.0) += candidate.score;
            }
        }

        if score_by_group.is_empty() {
            return GroupRoute {
                group: Group::Other,
                reason: "empty score map".to_string(),
                confidence: 0.0,
            };
        }

        let (selected_group, total_score) = score_by_group
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(g, s)| (*g, *s))
            .expect("non-empty map");

        let sum: f64 = score_by_group.values().sum();
        let confidence = if sum > 0.0 { total_score / sum } else { 0.0 };

        GroupRoute {
            group: selected_group,
            reason: format!("top aggregated score from {} candidates", candidates.len()),
            confidence,
        }
    }

    /// Stage B: re-run hybrid search restricted to `group` (or the group
    /// `route_group` selects, when `None`).
    pub fn select_tools(&self, query: &str, group: Option<Group>, top_k: Option<usize>) -> Vec<ToolScore> {
        let selected_group = group.unwrap_or_else(|| self.route_group(query).group);
        let limit = top_k.unwrap_or(self.tool_top_k);
        self.retriever.search(query, Some(&[selected_group]), limit)
    }

    pub fn group_top_k(&self) -> usize {
        self.group_top_k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::models::Group;

    fn record(name: &str, description: &str, group: Group) -> ToolRecord {
        ToolRecord {
            tool_id: format!("{name}:fixture"),
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({}),
            output_schema: None,
            group,
            tags: vec!["generic".into()],
            schema_hash: "fixture".into(),
        }
    }

    fn fixture_records() -> Vec<ToolRecord> {
        vec![
            record("hwp_export_pdf", "Export the document as pdf", Group::ExportConvert),
            record("hwp_export_html", "Export the document as html", Group::ExportConvert),
            record("hwp_insert_text", "Insert text into the document", Group::TextInsertion),
            record("hwp_ping", "Health check ping", Group::UtilDebug),
        ]
    }

    #[test]
    fn route_group_picks_export_convert_for_export_query() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let route = router.route_group("export document to pdf");
        assert_eq!(route.group, Group::ExportConvert);
        assert!(route.confidence > 0.0 && route.confidence <= 1.0);
    }

    #[test]
    fn route_group_confidence_is_bounded() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let route = router.route_group("insert bold text");
        assert!(route.confidence >= 0.0 && route.confidence <= 1.0);
    }

    #[test]
    fn route_group_falls_back_to_other_when_nothing_matches() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let route = router.route_group("zzz qqq unrelated nonsense");
        assert_eq!(route.group, Group::Other);
        assert_eq!(route.confidence, 0.0);
    }

    #[test]
    fn select_tools_restricts_to_explicit_group() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let scores = router.select_tools("document", Some(Group::TextInsertion), None);
        assert!(scores.iter().all(|s| s.tool_id == "hwp_insert_text:fixture"));
    }

    #[test]
    fn select_tools_defaults_to_routed_group() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let scores = router.select_tools("export to pdf", None, None);
        assert!(scores
            .iter()
            .all(|s| s.tool_id.starts_with("hwp_export_")));
    }

    #[test]
    fn select_tools_respects_explicit_top_k() {
        let records = fixture_records();
        let router = HierarchicalRouter::new(&records);
        let scores = router.select_tools("export", Some(Group::ExportConvert), Some(1));
        assert_eq!(scores.len(), 1);
    }
}
