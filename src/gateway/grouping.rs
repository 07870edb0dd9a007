//! Keyword-based group classification.
//!
//! Grounded on `original_source/hwpx_mcp/agentic/grouping.py`: same nine
//! groups, same keyword tuples, same first-match-wins iteration order. The
//! order of `GROUP_KEYWORDS` defines the tie-break, so it must not be
//! reordered casually.

use crate::gateway::models::Group;

pub const GROUP_KEYWORDS: &[(Group, &[&str])] = &[
    (
        Group::DocumentLifecycle,
        &["connect", "disconnect", "create", "open", "save", "close", "document"],
    ),
    (
        Group::TextInsertion,
        &[
            "insert_text",
            "font",
            "charshape",
            "parashape",
            "paragraph",
            "heading",
            "bold",
            "italic",
            "underline",
        ],
    ),
    (
        Group::TableChart,
        &["table", "cell", "chart", "picture", "image", "equation"],
    ),
    (
        Group::FieldMeta,
        &["field", "bookmark", "metatag", "metadata", "template"],
    ),
    (Group::FindReplace, &["find", "replace", "search"]),
    (
        Group::XmlDirect,
        &["xml", "xpath", "validate", "parse_section", "smart_patch"],
    ),
    (Group::ExportConvert, &["export", "convert", "pdf", "html"]),
    (
        Group::UtilDebug,
        &["ping", "capabilities", "platform_info", "get_document_info", "page_count"],
    ),
];

/// Classify a tool into one of the nine groups. Iterates `GROUP_KEYWORDS`
/// in order and returns on first match; `Group::Other` is the fallback.
pub fn classify_group(name: &str, description: &str) -> Group {
    let lowered = format!("{name} {description}").to_lowercase();
    for (group, keywords) in GROUP_KEYWORDS {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return *group;
        }
    }
    Group::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_keyword_wins_over_fallback() {
        assert_eq!(
            classify_group("hwp_export_pdf", "Export the document as PDF"),
            Group::ExportConvert
        );
    }

    #[test]
    fn unmatched_text_falls_back_to_other() {
        assert_eq!(classify_group("frobnicate", "does something unrelated"), Group::Other);
    }

    #[test]
    fn first_matching_group_wins_on_ties() {
        // "document" matches document_lifecycle; "template" would also match
        // field_meta, but document_lifecycle is checked first.
        assert_eq!(
            classify_group("hwp_create_from_template", "Create a document from a template"),
            Group::DocumentLifecycle
        );
    }

    #[test]
    fn util_debug_keywords_classify_correctly() {
        assert_eq!(classify_group("hwp_ping", "Health check"), Group::UtilDebug);
        assert_eq!(
            classify_group("hwp_platform_info", "Report platform info"),
            Group::UtilDebug
        );
    }
}
