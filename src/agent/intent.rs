//! Intent parsing and case detection.
//!
//! Grounded on `tool_only_agent.py`'s `_parse_intent`/`_detect_case`/
//! `_extract_quoted_text`. Keyword lists and iteration order are carried
//! over exactly, English and Korean tokens side by side as the original
//! has them.

use crate::agent::state::{Case, Intent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']+)'").unwrap());
static WORD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\p{Hangul}]+").unwrap());

/// First quoted span in `message`, preferring double quotes over single.
pub fn extract_quoted_text(message: &str) -> Option<String> {
    if let Some(caps) = DOUBLE_QUOTED.captures(message) {
        return Some(caps[1].trim().to_string());
    }
    if let Some(caps) = SINGLE_QUOTED.captures(message) {
        return Some(caps[1].trim().to_string());
    }
    None
}

/// Last standalone word/Hangul token longer than one character.
pub fn last_meaningful_token(message: &str) -> Option<String> {
    WORD_TOKEN
        .find_iter(message)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.chars().count() > 1)
        .last()
}

pub fn parse_intent(message: &str) -> Intent {
    let lowered = message.to_lowercase();
    let contains_any = |tokens: &[&str]| tokens.iter().any(|t| lowered.contains(t));

    if contains_any(&["status", "ping", "상태", "헬스"]) {
        Intent::Status
    } else if contains_any(&["capability", "capabilities", "지원", "가능"]) {
        Intent::Capabilities
    } else if contains_any(&["template", "템플릿", "양식"]) {
        Intent::Template
    } else if contains_any(&["export pdf", "pdf", "내보내기"]) {
        Intent::ExportPdf
    } else if contains_any(&["save", "저장"]) {
        Intent::Save
    } else if contains_any(&["find", "search", "찾기", "검색"]) {
        Intent::Search
    } else if contains_any(&["insert", "write", "작성", "추가", "입력"]) {
        Intent::InsertText
    } else if contains_any(&["create", "new", "문서 생성", "새 문서", "만들"]) {
        Intent::Create
    } else {
        Intent::Unknown
    }
}

pub fn detect_case(message: &str, tool_names: &HashSet<String>) -> Case {
    let lowered = message.to_lowercase();
    let has_windows = tool_names.iter().any(|n| n.starts_with("hwp_windows_"));
    let has_templates = tool_names.contains("hwp_list_templates");
    let has_hwpx = tool_names.contains("hwp_create_hwpx");
    let has_doc_ops = ["hwp_create", "hwp_insert_text", "hwp_save"]
        .iter()
        .any(|n| tool_names.contains(*n));
    let has_xml_only = !tool_names.is_empty()
        && tool_names
            .iter()
            .all(|n| n.contains("xml") || n.contains("xpath") || n.contains("smart_patch"));

    let template_requested = ["template", "템플릿", "양식"].iter().any(|t| lowered.contains(t));

    if template_requested && has_templates {
        Case::TemplateWorkflow
    } else if has_windows {
        Case::WindowsComFull
    } else if has_xml_only {
        Case::QueryAnalyzeOnly
    } else if has_hwpx {
        Case::CrossPlatformHwpx
    } else if has_doc_ops {
        Case::NoDocumentContext
    } else {
        Case::DegradedRecovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_quoted_text_prefers_double_quotes() {
        assert_eq!(
            extract_quoted_text(r#"insert "hello" and 'world'"#),
            Some("hello".to_string())
        );
    }

    #[test]
    fn extract_quoted_text_falls_back_to_single_quotes() {
        assert_eq!(extract_quoted_text("find 'revenue'"), Some("revenue".to_string()));
    }

    #[test]
    fn extract_quoted_text_returns_none_without_quotes() {
        assert_eq!(extract_quoted_text("no quotes here"), None);
    }

    #[test]
    fn parse_intent_recognizes_korean_tokens() {
        assert_eq!(parse_intent("상태 확인해줘"), Intent::Status);
        assert_eq!(parse_intent("매출 찾아줘"), Intent::Search);
    }

    #[test]
    fn parse_intent_checks_export_pdf_before_generic_save() {
        assert_eq!(parse_intent("export pdf please and save it"), Intent::ExportPdf);
    }

    #[test]
    fn parse_intent_defaults_to_unknown() {
        assert_eq!(parse_intent("xyzzy plugh"), Intent::Unknown);
    }

    #[test]
    fn detect_case_prefers_template_workflow_when_requested_and_available() {
        let tools: HashSet<String> = ["hwp_list_templates".to_string()].into_iter().collect();
        assert_eq!(detect_case("템플릿 추천해줘", &tools), Case::TemplateWorkflow);
    }

    #[test]
    fn detect_case_falls_back_to_windows_com_full() {
        let tools: HashSet<String> = ["hwp_windows_insert_text".to_string()].into_iter().collect();
        assert_eq!(detect_case("아무 메시지", &tools), Case::WindowsComFull);
    }

    #[test]
    fn detect_case_reports_degraded_recovery_when_tool_set_is_empty() {
        let tools: HashSet<String> = HashSet::new();
        assert_eq!(detect_case("anything", &tools), Case::DegradedRecovery);
    }

    #[test]
    fn detect_case_recognizes_xml_only_tool_set() {
        let tools: HashSet<String> = ["hwp_xml_query".to_string(), "hwp_xpath_get".to_string()]
            .into_iter()
            .collect();
        assert_eq!(detect_case("query the xml", &tools), Case::QueryAnalyzeOnly);
    }
}
