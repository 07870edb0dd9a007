//! Lexical (BM25), semantic (Jaccard) and hybrid retrieval.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/retrieval.py`. The token
//! pattern, BM25 constants, pool sizing, and fusion weights are carried over
//! unchanged. `SemanticRetriever` stands in for a true embedding-based
//! retriever; it implements the same `Retriever` trait so a drop-in
//! replacement is possible without touching the router.

use crate::gateway::models::{Group, ScoreReason, ToolRecord, ToolScore};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9_]+").unwrap());

fn tokenize(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn tokenize_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Common shape both scorers (and any future drop-in replacement) expose.
pub trait Retriever {
    fn search(&self, query: &str, groups: Option<&[Group]>, top_k: usize) -> Vec<ToolScore>;
}

fn passes_group_filter(record: &ToolRecord, groups: Option<&[Group]>) -> bool {
    match groups {
        None => true,
        Some(allowed) if allowed.is_empty() => true,
        Some(allowed) => allowed.contains(&record.group),
    }
}

fn sort_and_truncate(mut scores: Vec<ToolScore>, top_k: usize) -> Vec<ToolScore> {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });
    scores.truncate(top_k);
    scores
}

/// BM25-style scorer over each record's search blob.
pub struct LexicalRetriever<'a> {
    records: &'a [ToolRecord],
    term_frequencies: Vec<HashMap<String, usize>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
    idf: HashMap<String, f64>,
    k1: f64,
    b: f64,
}

impl<'a> LexicalRetriever<'a> {
    pub fn new(records: &'a [ToolRecord]) -> Self {
        let mut term_frequencies = Vec::with_capacity(records.len());
        let mut doc_lengths = Vec::with_capacity(records.len());
        let mut document_frequencies: HashMap<String, usize> = HashMap::new();

        for record in records {
            let tokens = tokenize(&record.search_blob());
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for token in tf.keys() {
                *document_frequencies.entry(token.clone()).or_insert(0) += 1;
            }
            doc_lengths.push(tokens.len());
            term_frequencies.push(tf);
        }

        let total_docs = records.len().max(1) as f64;
        let avg_doc_length = if doc_lengths.is_empty() {
            1.0
        } else {
            doc_lengths.iter().sum::<usize>() as f64 / doc_lengths.len() as f64
        };

        let idf = document_frequencies
            .into_iter()
            .map(|(token, df)| {
                let value = (1.0 + (total_docs - df as f64 + 0.5) / (df as f64 + 0.5)).ln();
                (token, value)
            })
            .collect();

        Self {
            records,
            term_frequencies,
            doc_lengths,
            avg_doc_length,
            idf,
            k1: 1.5,
            b: 0.75,
        }
    }
}

impl<'a> Retriever for LexicalRetriever<'a> {
    fn search(&self, query: &str, groups: Option<&[Group]>, top_k: usize) -> Vec<ToolScore> {
        if top_k == 0 {
            return Vec::new();
        }
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        let mut scores = Vec::new();

        for (idx, record) in self.records.iter().enumerate() {
            if !passes_group_filter(record, groups) {
                continue;
            }
            let tf = &self.term_frequencies[idx];
            let doc_length = self.doc_lengths[idx] as f64;
            let mut score = 0.0;
            for term in &query_terms {
                let term_frequency = *tf.get(term).unwrap_or(&0) as f64;
                if term_frequency <= 0.0 {
                    continue;
                }
                let idf = *self.idf.get(term).unwrap_or(&0.0);
                let denominator = term_frequency
                    + self.k1 * (1.0 - self.b + self.b * (doc_length / self.avg_doc_length));
                score += idf * ((term_frequency * (self.k1 + 1.0)) / denominator);
            }
            if score > 0.0 {
                scores.push(ToolScore {
                    tool_id: record.tool_id.clone(),
                    score,
                    reason: ScoreReason::Lexical,
                });
            }
        }

        sort_and_truncate(scores, top_k)
    }
}

/// Token-set Jaccard scorer, a stand-in for embedding similarity.
pub struct SemanticRetriever<'a> {
    records: &'a [ToolRecord],
}

impl<'a> SemanticRetriever<'a> {
    pub fn new(records: &'a [ToolRecord]) -> Self {
        Self { records }
    }
}

impl<'a> Retriever for SemanticRetriever<'a> {
    fn search(&self, query: &str, groups: Option<&[Group]>, top_k: usize) -> Vec<ToolScore> {
        if top_k == 0 {
            return Vec::new();
        }
        let query_tokens = tokenize_set(query);
        let mut scores = Vec::new();

        for record in self.records {
            if !passes_group_filter(record, groups) {
                continue;
            }
            let record_tokens = tokenize_set(&record.search_blob());
            if record_tokens.is_empty() {
                continue;
            }
            let intersection = query_tokens.intersection(&record_tokens).count();
            let union = query_tokens.union(&record_tokens).count().max(1);
            let score = intersection as f64 / union as f64;
            if score > 0.0 {
                scores.push(ToolScore {
                    tool_id: record.tool_id.clone(),
                    score,
                    reason: ScoreReason::Semantic,
                });
            }
        }

        sort_and_truncate(scores, top_k)
    }
}

fn normalize(scores: &[ToolScore]) -> HashMap<String, f64> {
    let max_score = scores.iter().map(|s| s.score).fold(0.0_f64, f64::max);
    scores
        .iter()
        .map(|s| {
            let value = if max_score > 0.0 { s.score / max_score } else { 0.0 };
            (s.tool_id.clone(), value)
        })
        .collect()
}

/// Max-normalize and weight-fuse lexical + semantic scores.
pub struct HybridRetriever<'a> {
    lexical: LexicalRetriever<'a>,
    semantic: SemanticRetriever<'a>,
    lexical_weight: f64,
    semantic_weight: f64,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(records: &'a [ToolRecord]) -> Self {
        Self {
            lexical: LexicalRetriever::new(records),
            semantic: SemanticRetriever::new(records),
            lexical_weight: 0.65,
            semantic_weight: 0.35,
        }
    }
}

impl<'a> Retriever for HybridRetriever<'a> {
    fn search(&self, query: &str, groups: Option<&[Group]>, top_k: usize) -> Vec<ToolScore> {
        if top_k == 0 {
            return Vec::new();
        }
        let pool = (top_k * 3).max(top_k);
        let lexical_scores = self.lexical.search(query, groups, pool);
        let semantic_scores = self.semantic.search(query, groups, pool);

        let lexical_norm = normalize(&lexical_scores);
        let semantic_norm = normalize(&semantic_scores);

        let mut fused: HashMap<String, f64> = HashMap::new();
        for score in &lexical_scores {
            *fused.entry(score.tool_id.clone()).or_insert(0.0) +=
                self.lexical_weight * lexical_norm.get(&score.tool_id).copied().unwrap_or(0.0);
        }
        for score in &semantic_scores {
            *fused.entry(score.tool_id.clone()).or_insert(0.0) +=
                self.semantic_weight * semantic_norm.get(&score.tool_id).copied().unwrap_or(0.0);
        }

        let merged: Vec<ToolScore> = fused
            .into_iter()
            .map(|(tool_id, score)| ToolScore {
                tool_id,
                score,
                reason: ScoreReason::Hybrid,
            })
            .collect();

        sort_and_truncate(merged, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            record("hwp_insert_text", "Insert text into the document", Group::TextInsertion),
            record("hwp_ping", "Health check ping", Group::UtilDebug),
        ]
    }

    #[test]
    fn bm25_scores_strictly_higher_with_all_query_terms_present() {
        let records = fixture_records();
        let retriever = LexicalRetriever::new(&records);
        let scores = retriever.search("export pdf", None, 10);
        let by_id: HashMap<&str, f64> = scores.iter().map(|s| (s.tool_id.as_str(), s.score)).collect();
        let export_score = *by_id.get("hwp_export_pdf:fixture").unwrap();
        let ping_score = by_id.get("hwp_ping:fixture").copied().unwrap_or(0.0);
        assert!(export_score > ping_score);
    }

    #[test]
    fn lexical_respects_group_filter() {
        let records = fixture_records();
        let retriever = LexicalRetriever::new(&records);
        let scores = retriever.search("document", Some(&[Group::TextInsertion]), 10);
        assert!(scores.iter().all(|s| s.tool_id == "hwp_insert_text:fixture"));
    }

    #[test]
    fn lexical_top_k_zero_returns_empty() {
        let records = fixture_records();
        let retriever = LexicalRetriever::new(&records);
        assert!(retriever.search("export", None, 0).is_empty());
    }

    #[test]
    fn semantic_scores_are_bounded_by_one() {
        let records = fixture_records();
        let retriever = SemanticRetriever::new(&records);
        let scores = retriever.search("export pdf document", None, 10);
        for score in scores {
            assert!(score.score > 0.0 && score.score <= 1.0);
        }
    }

    #[test]
    fn hybrid_fusion_scores_are_bounded_by_sum_of_weights() {
        let records = fixture_records();
        let retriever = HybridRetriever::new(&records);
        let scores = retriever.search("export pdf", None, 10);
        for score in scores {
            assert!(score.score >= 0.0 && score.score <= 1.0);
        }
    }

    #[test]
    fn hybrid_ranks_export_pdf_top_for_export_query() {
        let records = fixture_records();
        let retriever = HybridRetriever::new(&records);
        let scores = retriever.search("export as pdf", None, 1);
        assert_eq!(scores[0].tool_id, "hwp_export_pdf:fixture");
    }

    #[test]
    fn candidate_missing_from_one_list_still_surfaces_via_the_other() {
        // "ping" only matches lexically (zero semantic token overlap with "insert text"),
        // it should still appear through its lexical-only normalized contribution.
        let records = fixture_records();
        let retriever = HybridRetriever::new(&records);
        let scores = retriever.search("ping", None, 10);
        assert!(scores.iter().any(|s| s.tool_id == "hwp_ping:fixture"));
    }

    proptest::proptest! {
        #[test]
        fn hybrid_scores_stay_in_unit_range_for_any_word_subset_query(
            words in proptest::collection::vec("[a-z]{2,8}", 0..5),
        ) {
            let records = fixture_records();
            let retriever = HybridRetriever::new(&records);
            let query = words.join(" ");
            let scores = retriever.search(&query, None, 10);
            for score in scores {
                proptest::prop_assert!(score.score >= 0.0 && score.score <= 1.0);
            }
        }
    }
}
