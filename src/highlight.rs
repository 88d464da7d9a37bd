//! Highlight snippet extraction for search results.

use crate::chunking::split_sentences;

/// Maximum number of highlight snippets attached to a result.
const MAX_HIGHLIGHTS: usize = 3;

/// Extract up to three sentences of `text` that contain a query term.
///
/// The query is split on whitespace and matched case-insensitively as
/// substrings, so Korean particles attached to a term still match.
/// Sentences are returned in document order. An empty result means no
/// sentence mentioned any term.
pub fn extract_highlights(text: &str, query: &str) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() {
        return Vec::new();
    }

    split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let sentence_lower = sentence.to_lowercase();
            terms.iter().any(|term| sentence_lower.contains(term))
        })
        .take(MAX_HIGHLIGHTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_match_case_insensitively() {
        let text = "React 개발 경험이 있습니다.\n저는 Vue도 다뤄 보았습니다.";
        let highlights = extract_highlights(text, "react 경험");
        assert_eq!(highlights, vec!["React 개발 경험이 있습니다."]);
    }

    #[test]
    fn highlights_are_capped_at_three() {
        let text = "첫 번째 Redis 문장입니다.\n두 번째 Redis 문장입니다.\n\
                    세 번째 Redis 문장입니다.\n네 번째 Redis 문장입니다.";
        let highlights = extract_highlights(text, "redis");
        assert_eq!(highlights.len(), 3);
        assert!(highlights[0].starts_with("첫"));
    }

    #[test]
    fn highlights_keep_document_order() {
        let text = "도입부 문장입니다.\nKafka 파이프라인을 구축했습니다.\nKafka 운영도 담당했습니다.";
        let highlights = extract_highlights(text, "kafka");
        assert_eq!(highlights.len(), 2);
        assert!(highlights[0].contains("구축"));
        assert!(highlights[1].contains("운영"));
    }

    #[test]
    fn no_matching_terms_yields_empty() {
        assert!(extract_highlights("아무 관련 없는 내용입니다.", "graphql").is_empty());
        assert!(extract_highlights("본문", "").is_empty());
    }
}
