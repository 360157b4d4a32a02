use crate::models::analysis::{AnalysisStatus, ChunkAnalysis, Classification};

/// Merged results keep at most this many issues.
pub const MAX_MERGED_ISSUES: usize = 10;

/// Reduce an ordered list of chunk results into one check-level result.
///
/// A single result passes through unchanged, field for field. For more than
/// one: status and classification each take the maximum over their severity
/// order, issues are concatenated in chunk order and truncated to
/// [`MAX_MERGED_ISSUES`], and the summary line is synthesized from the
/// chunk and issue counts.
///
/// Callers pass the chunker's output, which is never empty; an empty input
/// produces an explicit degraded marker rather than a panic.
pub fn merge_chunk_results(mut results: Vec<ChunkAnalysis>) -> ChunkAnalysis {
    if results.len() <= 1 {
        return results.pop().unwrap_or_else(no_results_marker);
    }

    let chunk_count = results.len();
    let mut status = AnalysisStatus::Safe;
    let mut classification = Classification::Safe;
    let mut total_issues = 0;
    for result in &results {
        status = status.max(result.status);
        classification = classification.max(result.classification);
        total_issues += result.issues.len();
    }

    let issues = results
        .into_iter()
        .flat_map(|result| result.issues)
        .take(MAX_MERGED_ISSUES)
        .collect();

    ChunkAnalysis {
        status,
        classification,
        short_description: format!(
            "Merged verdict from {chunk_count} chunks; {total_issues} issue(s) reported in total."
        ),
        issues,
    }
}

fn no_results_marker() -> ChunkAnalysis {
    ChunkAnalysis {
        status: AnalysisStatus::Warning,
        classification: Classification::PotentiallyUnsafe,
        short_description: "No chunk results were produced for this check.".to_string(),
        issues: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{Issue, IssueSeverity};

    fn result(status: AnalysisStatus, classification: Classification) -> ChunkAnalysis {
        ChunkAnalysis {
            status,
            classification,
            short_description: "chunk verdict".to_string(),
            issues: Vec::new(),
        }
    }

    fn issue(kind: &str) -> Issue {
        Issue {
            kind: kind.to_string(),
            severity: IssueSeverity::Low,
            description: "desc".to_string(),
            recommendation: "fix".to_string(),
        }
    }

    #[test]
    fn single_result_is_identity() {
        let mut single = result(AnalysisStatus::Warning, Classification::Unsafe);
        single.issues.push(issue("dynamic_code"));
        let merged = merge_chunk_results(vec![single.clone()]);
        assert_eq!(merged, single);
    }

    #[test]
    fn classification_takes_the_maximum() {
        let merged = merge_chunk_results(vec![
            result(AnalysisStatus::Safe, Classification::Safe),
            result(AnalysisStatus::Safe, Classification::Critical),
        ]);
        assert_eq!(merged.classification, Classification::Critical);
    }

    #[test]
    fn status_takes_the_maximum() {
        let merged = merge_chunk_results(vec![
            result(AnalysisStatus::Safe, Classification::Safe),
            result(AnalysisStatus::Warning, Classification::Safe),
            result(AnalysisStatus::Danger, Classification::Safe),
        ]);
        assert_eq!(merged.status, AnalysisStatus::Danger);
    }

    #[test]
    fn issues_concatenate_in_chunk_order_and_truncate() {
        let mut chunks = Vec::new();
        for chunk_index in 0..3 {
            let mut r = result(AnalysisStatus::Safe, Classification::Safe);
            for issue_index in 0..4 {
                r.issues.push(issue(&format!("c{chunk_index}-i{issue_index}")));
            }
            chunks.push(r);
        }

        let merged = merge_chunk_results(chunks);
        assert_eq!(merged.issues.len(), MAX_MERGED_ISSUES);
        assert_eq!(merged.issues[0].kind, "c0-i0");
        assert_eq!(merged.issues[4].kind, "c1-i0");
    }

    #[test]
    fn summary_reports_chunk_and_issue_counts() {
        let mut first = result(AnalysisStatus::Safe, Classification::Safe);
        first.issues.push(issue("leak"));
        let merged = merge_chunk_results(vec![
            first,
            result(AnalysisStatus::Safe, Classification::Safe),
        ]);
        assert!(merged.short_description.contains("2 chunks"));
        assert!(merged.short_description.contains("1 issue"));
    }
}
