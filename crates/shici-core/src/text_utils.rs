//! Segmenting poem text for narration.

use crate::poem::PoemRecord;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clause terminators, full width and ASCII.
static RE_CLAUSE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[。！？；，、.!?;,]+").unwrap());

/// Split a line at clause punctuation, keeping the punctuation on the clause
/// it closes. Blank pieces are dropped.
pub fn split_clauses(line: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut start = 0;
    for mat in RE_CLAUSE_END.find_iter(line) {
        push_clause(&mut clauses, &line[start..mat.end()]);
        start = mat.end();
    }
    push_clause(&mut clauses, &line[start..]);
    clauses
}

fn push_clause(clauses: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        clauses.push(trimmed.to_string());
    }
}

/// Narration order for a poem: title, attribution, then each line's clauses.
pub fn poem_segments(record: &PoemRecord) -> Vec<String> {
    let mut segments = Vec::new();
    if !record.title.trim().is_empty() {
        segments.push(record.title.trim().to_string());
    }
    let attribution = match (record.dynasty.trim(), record.author.trim()) {
        ("", "") => String::new(),
        ("", author) => author.to_string(),
        (dynasty, "") => dynasty.to_string(),
        (dynasty, author) => format!("{dynasty}·{author}"),
    };
    if !attribution.is_empty() {
        segments.push(attribution);
    }
    for line in &record.content {
        segments.extend(split_clauses(line));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_full_width_punctuation() {
        assert_eq!(
            split_clauses("床前明月光，疑是地上霜。"),
            vec!["床前明月光，", "疑是地上霜。"]
        );
    }

    #[test]
    fn keeps_trailing_clause_without_punctuation() {
        assert_eq!(split_clauses("举头望明月"), vec!["举头望明月"]);
        assert!(split_clauses(" 。 ").is_empty());
    }

    #[test]
    fn poem_segments_lead_with_title_and_attribution() {
        let record = PoemRecord::new(
            "静夜思",
            "李白",
            "唐",
            vec!["床前明月光，疑是地上霜。".into(), "举头望明月，低头思故乡。".into()],
        );
        let segments = poem_segments(&record);
        assert_eq!(segments[0], "静夜思");
        assert_eq!(segments[1], "唐·李白");
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[5], "低头思故乡。");
    }

    #[test]
    fn attribution_omits_missing_parts() {
        let record = PoemRecord::new("无题", "", "", vec![]);
        assert_eq!(poem_segments(&record), vec!["无题"]);
    }
}
