use std::collections::BTreeMap;

use crate::model::{
    Diagnostic, DuplicateKey, MatchResult, MatchedRecord, ReconMeta, ReconSummary,
    ReconciliationReport, ReviewStatus, Source,
};

/// Compute summary statistics from match results. Pure tally; nothing is
/// re-matched or reordered.
///
/// With an `amount_column`, the anchor amounts of exact and auto-accepted
/// fuzzy triples are summed into `recovered_amount`. Missing or unparseable
/// amounts count as zero.
pub fn compute_summary(
    results: &[MatchResult],
    diagnostics: &[Diagnostic],
    duplicates: &[DuplicateKey],
    amount_column: Option<&str>,
) -> ReconSummary {
    let mut exact_count = 0;
    let mut fuzzy_count = 0;
    let mut unmatched_count = 0;
    let mut needs_review_count = 0;
    let mut confidence_sum: f64 = 0.0;
    let mut recovered: f64 = 0.0;
    let mut unmatched_by_source: BTreeMap<Source, usize> =
        Source::ALL.iter().map(|s| (*s, 0)).collect();

    let amount_of = |anchor: &MatchedRecord| -> f64 {
        amount_column
            .and_then(|col| anchor.get(col))
            .and_then(|v| v.as_amount())
            .unwrap_or(0.0)
    };

    for r in results {
        match r {
            MatchResult::Exact { anchor, .. } => {
                exact_count += 1;
                confidence_sum += 1.0;
                recovered += amount_of(anchor);
            }
            MatchResult::Fuzzy { anchor, confidence, review, .. } => {
                fuzzy_count += 1;
                confidence_sum += *confidence;
                match review {
                    ReviewStatus::AutoAccept => recovered += amount_of(anchor),
                    ReviewStatus::NeedsReview => needs_review_count += 1,
                }
            }
            MatchResult::Unmatched { record, .. } => {
                unmatched_count += 1;
                *unmatched_by_source.entry(record.source).or_insert(0) += 1;
            }
        }
    }

    let total_records: usize = results.iter().map(MatchResult::record_count).sum();
    let matched_records = 3 * (exact_count + fuzzy_count);
    let triples = exact_count + fuzzy_count;

    ReconSummary {
        total_records,
        exact_count,
        fuzzy_count,
        unmatched_count,
        match_rate_percent: match_rate_percent(matched_records, total_records),
        invalid_count: diagnostics.len(),
        needs_review_count,
        duplicate_key_records: duplicates.iter().map(|d| d.rows.len()).sum(),
        unmatched_by_source,
        avg_confidence: (triples > 0).then(|| confidence_sum / triples as f64),
        recovered_amount: amount_column.map(|_| round_cents(recovered)),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// `round(100 * matched / total)`, zero for an empty run.
pub fn match_rate_percent(matched_records: usize, total_records: usize) -> u32 {
    if total_records == 0 {
        return 0;
    }
    (100.0 * matched_records as f64 / total_records as f64).round() as u32
}

/// Fold match results into the final, immutable report.
pub fn aggregate(
    meta: ReconMeta,
    results: Vec<MatchResult>,
    diagnostics: Vec<Diagnostic>,
    duplicates: Vec<DuplicateKey>,
) -> ReconciliationReport {
    let summary = compute_summary(
        &results,
        &diagnostics,
        &duplicates,
        meta.amount_column.as_deref(),
    );
    ReconciliationReport {
        meta,
        summary,
        results,
        diagnostics,
        duplicates,
    }
}
