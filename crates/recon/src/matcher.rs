use crate::index::KeyIndex;
use crate::model::{MatchResult, MatchedRecord, ReconInput, ReviewStatus, Source, UnmatchReason};
use crate::scoring::{clamp_confidence, ConfidenceScorer, ScoreInput};
use crate::similarity::{distance, Threshold};

/// Knobs the matcher needs beyond the indexes themselves.
pub struct MatchPolicy<'a> {
    pub threshold: Threshold,
    /// Fuzzy confidence at or above this is auto-accepted.
    pub auto_accept: f64,
    pub scorer: &'a dyn ConfidenceScorer,
}

/// Closest unconsumed row in one secondary index for a given anchor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    pub row: usize,
    pub distance: usize,
    pub within_threshold: bool,
}

/// Minimum-distance unconsumed row; ties go to the lowest row.
pub fn best_candidate(index: &KeyIndex, key: &str, threshold: &Threshold) -> Option<MatchCandidate> {
    let (dist, row) = closest(index, key)?;
    Some(MatchCandidate {
        row,
        distance: dist,
        within_threshold: threshold.accepts(key, index.key(row), dist),
    })
}

#[cfg(not(feature = "parallel"))]
fn closest(index: &KeyIndex, key: &str) -> Option<(usize, usize)> {
    index
        .unconsumed()
        .map(|row| (distance(key, index.key(row)), row))
        .min()
}

#[cfg(feature = "parallel")]
fn closest(index: &KeyIndex, key: &str) -> Option<(usize, usize)> {
    use rayon::prelude::*;

    let rows: Vec<usize> = index.unconsumed().collect();
    rows.par_iter()
        .map(|&row| (distance(key, index.key(row)), row))
        .min()
}

fn matched_record(input: &ReconInput, index: &KeyIndex, row: usize) -> MatchedRecord {
    let reference = index.reference(row);
    MatchedRecord {
        source: reference.source,
        row: reference.row,
        key: index.key(row).to_string(),
        fields: input.records(reference.source)[row].fields.clone(),
    }
}

/// Walk the primary source in input order and classify every record of all
/// three sources exactly once.
///
/// Per anchor: exact key in both secondaries, else the closest candidate in
/// each secondary. A triple is only formed when both secondaries agree;
/// a lone corroborating candidate stays available for later anchors.
/// Secondary rows nobody claimed are emitted last, `secondary_a` first.
pub fn match_sources(
    input: &ReconInput,
    primary: &mut KeyIndex,
    secondary_a: &mut KeyIndex,
    secondary_b: &mut KeyIndex,
    policy: &MatchPolicy<'_>,
) -> Vec<MatchResult> {
    let mut results = Vec::with_capacity(primary.len());

    for row in 0..primary.len() {
        primary.consume(row);
        let anchor = matched_record(input, primary, row);

        if anchor.key.is_empty() {
            tracing::debug!(source = %primary.source(), row, "anchor unidentifiable");
            results.push(MatchResult::Unmatched {
                record: anchor,
                reason: UnmatchReason::Unidentifiable,
            });
            continue;
        }

        // Exact attempt
        if let (Some(ra), Some(rb)) = (
            secondary_a.lookup_exact(&anchor.key),
            secondary_b.lookup_exact(&anchor.key),
        ) {
            secondary_a.consume(ra);
            secondary_b.consume(rb);
            tracing::debug!(row, key = %anchor.key, "exact match");
            results.push(MatchResult::Exact {
                match_a: matched_record(input, secondary_a, ra),
                match_b: matched_record(input, secondary_b, rb),
                anchor,
            });
            continue;
        }

        // Fuzzy attempt
        let cand_a = best_candidate(secondary_a, &anchor.key, &policy.threshold)
            .filter(|c| c.within_threshold);
        let cand_b = best_candidate(secondary_b, &anchor.key, &policy.threshold)
            .filter(|c| c.within_threshold);

        match (cand_a, cand_b) {
            (Some(ca), Some(cb)) => {
                secondary_a.consume(ca.row);
                secondary_b.consume(cb.row);
                let match_a = matched_record(input, secondary_a, ca.row);
                let match_b = matched_record(input, secondary_b, cb.row);

                let confidence = clamp_confidence(policy.scorer.score(&ScoreInput {
                    anchor_key: &anchor.key,
                    key_a: &match_a.key,
                    key_b: &match_b.key,
                    distance_a: ca.distance,
                    distance_b: cb.distance,
                }));
                let review = if confidence >= policy.auto_accept {
                    ReviewStatus::AutoAccept
                } else {
                    ReviewStatus::NeedsReview
                };

                tracing::debug!(
                    row,
                    key = %anchor.key,
                    distance_a = ca.distance,
                    distance_b = cb.distance,
                    confidence,
                    "fuzzy match"
                );
                results.push(MatchResult::Fuzzy {
                    anchor,
                    match_a,
                    match_b,
                    distance_a: ca.distance,
                    distance_b: cb.distance,
                    confidence,
                    review,
                });
            }
            (Some(_), None) => {
                results.push(partial(anchor, secondary_a.source()));
            }
            (None, Some(_)) => {
                results.push(partial(anchor, secondary_b.source()));
            }
            (None, None) => {
                tracing::debug!(row, key = %anchor.key, "no candidate");
                results.push(MatchResult::Unmatched {
                    record: anchor,
                    reason: UnmatchReason::NoCandidate,
                });
            }
        }
    }

    for index in [&*secondary_a, &*secondary_b] {
        for row in index.remaining() {
            let reason = if index.is_valid(row) {
                UnmatchReason::Unclaimed
            } else {
                UnmatchReason::Unidentifiable
            };
            results.push(MatchResult::Unmatched {
                record: matched_record(input, index, row),
                reason,
            });
        }
    }
    drain(secondary_a);
    drain(secondary_b);

    results
}

fn partial(anchor: MatchedRecord, found_in: Source) -> MatchResult {
    tracing::debug!(row = anchor.row, key = %anchor.key, %found_in, "only one secondary corroborates");
    MatchResult::Unmatched {
        record: anchor,
        reason: UnmatchReason::PartialCorroboration { found_in },
    }
}

/// Leftovers have been reported; mark them so the index reads fully spent.
fn drain(index: &mut KeyIndex) {
    let rows: Vec<usize> = index.remaining().collect();
    for row in rows {
        index.consume(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityField;
    use crate::model::Record;
    use crate::normalize::KeySpec;
    use crate::scoring::DistanceConfidence;

    fn spec() -> KeySpec {
        KeySpec::new(vec![IdentityField::column("name")])
    }

    fn records(source: Source, names: &[&str]) -> Vec<Record> {
        names
            .iter()
            .enumerate()
            .map(|(row, n)| Record::new(source, row).with("name", *n))
            .collect()
    }

    fn run(pos: &[&str], a: &[&str], b: &[&str]) -> Vec<MatchResult> {
        let input = ReconInput {
            pos: records(Source::Pos, pos),
            program_a: records(Source::ProgramA, a),
            program_b: records(Source::ProgramB, b),
        };
        let spec = spec();
        let mut p = KeyIndex::build(Source::Pos, &input.pos, &spec);
        let mut ia = KeyIndex::build(Source::ProgramA, &input.program_a, &spec);
        let mut ib = KeyIndex::build(Source::ProgramB, &input.program_b, &spec);
        let scorer = DistanceConfidence { max_distance: 5.0 };
        let policy = MatchPolicy {
            threshold: Threshold::default(),
            auto_accept: 0.95,
            scorer: &scorer,
        };
        match_sources(&input, &mut p, &mut ia, &mut ib, &policy)
    }

    #[test]
    fn best_candidate_prefers_first_minimum() {
        let recs = records(Source::ProgramA, &["abcx", "abcy", "abcd"]);
        let idx = KeyIndex::build(Source::ProgramA, &recs, &spec());
        let c = best_candidate(&idx, "abcz", &Threshold::default()).unwrap();
        assert_eq!(c, MatchCandidate { row: 0, distance: 1, within_threshold: true });
    }

    #[test]
    fn best_candidate_reports_rejection() {
        let recs = records(Source::ProgramA, &["zzzzzzzzzz"]);
        let idx = KeyIndex::build(Source::ProgramA, &recs, &spec());
        let c = best_candidate(&idx, "a", &Threshold::default()).unwrap();
        assert_eq!(c.distance, 10);
        assert!(!c.within_threshold);
    }

    #[test]
    fn exact_triple() {
        let out = run(&["Ann Lee"], &["ann  lee"], &["ANN LEE"]);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], MatchResult::Exact { .. }));
    }

    #[test]
    fn one_exact_one_fuzzy_becomes_fuzzy() {
        let out = run(&["Ann Lee"], &["Ann Lee"], &["Anne Lee"]);
        assert_eq!(out.len(), 1);
        match &out[0] {
            MatchResult::Fuzzy { distance_a, distance_b, review, .. } => {
                assert_eq!(*distance_a, 0);
                assert_eq!(*distance_b, 1);
                assert_eq!(*review, ReviewStatus::NeedsReview);
            }
            other => panic!("expected fuzzy, got {other:?}"),
        }
    }

    #[test]
    fn single_secondary_is_not_enough() {
        let out = run(&["Ann Lee"], &["Ann Lee"], &["Zebediah Fortescue"]);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out[0],
            MatchResult::Unmatched {
                record: MatchedRecord {
                    source: Source::Pos,
                    row: 0,
                    key: "ann lee".into(),
                    fields: records(Source::Pos, &["Ann Lee"])[0].fields.clone(),
                },
                reason: UnmatchReason::PartialCorroboration { found_in: Source::ProgramA },
            }
        );
        // The lone candidate was not consumed.
        assert!(matches!(
            &out[1],
            MatchResult::Unmatched { record, reason: UnmatchReason::Unclaimed } if record.source == Source::ProgramA
        ));
        assert!(matches!(
            &out[2],
            MatchResult::Unmatched { record, reason: UnmatchReason::Unclaimed } if record.source == Source::ProgramB
        ));
    }

    #[test]
    fn unidentifiable_records_are_reported_once() {
        let out = run(&["", "Bo"], &["  ", "Bo"], &["Bo"]);
        let total: usize = out.iter().map(MatchResult::record_count).sum();
        assert_eq!(total, 5);
        let unidentifiable = out
            .iter()
            .filter(|r| matches!(r, MatchResult::Unmatched { reason: UnmatchReason::Unidentifiable, .. }))
            .count();
        assert_eq!(unidentifiable, 2);
        assert!(out.iter().any(|r| matches!(r, MatchResult::Exact { .. })));
    }

    #[test]
    fn results_carry_loaded_row_numbers() {
        let offset = |source: Source, first: usize, names: &[&str]| -> Vec<Record> {
            names
                .iter()
                .enumerate()
                .map(|(i, n)| Record::new(source, first + i).with("name", *n))
                .collect()
        };
        let input = ReconInput {
            pos: offset(Source::Pos, 100, &["Zed Quill", "Ann Lee"]),
            program_a: offset(Source::ProgramA, 7, &["Ann Lee"]),
            program_b: offset(Source::ProgramB, 0, &["Ann Lee"]),
        };
        let spec = spec();
        let mut p = KeyIndex::build(Source::Pos, &input.pos, &spec);
        let mut ia = KeyIndex::build(Source::ProgramA, &input.program_a, &spec);
        let mut ib = KeyIndex::build(Source::ProgramB, &input.program_b, &spec);
        let scorer = DistanceConfidence { max_distance: 5.0 };
        let policy = MatchPolicy {
            threshold: Threshold::default(),
            auto_accept: 0.95,
            scorer: &scorer,
        };
        let out = match_sources(&input, &mut p, &mut ia, &mut ib, &policy);

        match &out[0] {
            MatchResult::Unmatched { record, .. } => assert_eq!(record.row, 100),
            other => panic!("expected unmatched, got {other:?}"),
        }
        match &out[1] {
            MatchResult::Exact { anchor, match_a, match_b } => {
                assert_eq!((anchor.row, match_a.row, match_b.row), (101, 7, 0));
            }
            other => panic!("expected exact, got {other:?}"),
        }
    }

    // cargo test -p tally-recon --features parallel
    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_scan_matches_sequential_reduction() {
        let names: Vec<String> = (0..200)
            .map(|i| format!("client {} {}", i % 17, i % 5))
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let recs = records(Source::ProgramA, &refs);
        let mut idx = KeyIndex::build(Source::ProgramA, &recs, &spec());
        for row in (0..200).step_by(3) {
            idx.consume(row);
        }

        for key in ["client 3 1", "client 16 4", "clint 9 9", "zzz"] {
            let sequential = idx
                .unconsumed()
                .map(|row| (distance(key, idx.key(row)), row))
                .min();
            assert_eq!(closest(&idx, key), sequential, "key {key}");
        }
    }
}
