use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Origin of a record. `Pos` is the default anchor source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    Pos,
    ProgramA,
    ProgramB,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Pos, Source::ProgramA, Source::ProgramB];

    /// The two non-primary sources, in declaration order.
    pub fn secondaries(self) -> [Source; 2] {
        match self {
            Self::Pos => [Self::ProgramA, Self::ProgramB],
            Self::ProgramA => [Self::Pos, Self::ProgramB],
            Self::ProgramB => [Self::Pos, Self::ProgramA],
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pos => write!(f, "pos"),
            Self::ProgramA => write!(f, "programA"),
            Self::ProgramB => write!(f, "programB"),
        }
    }
}

/// A single cell value as handed over by the parsing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    /// String form fed to the normalizer. Whole numbers render without a
    /// trailing `.0` so a phone column parsed as a number still keys the same.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    /// Monetary reading of the value. Tolerates a leading `$` and thousands
    /// separators; anything else that does not parse is `None`.
    pub fn as_amount(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let cleaned: String = s.trim().trim_start_matches('$').chars().filter(|c| *c != ',').collect();
                cleaned.trim().parse().ok()?
            }
        };
        n.is_finite().then_some(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Stable identity of a record within one run: its source plus the row
/// number the record was loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordRef {
    pub source: Source,
    pub row: usize,
}

/// One parsed row from any source export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub source: Source,
    pub row: usize,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(source: Source, row: usize) -> Self {
        Self {
            source,
            row,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insert.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Look up a field, tolerating header spelling differences
    /// (`FirstName`, `first_name`, `First Name`).
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        lookup_field(&self.fields, name)
    }
}

fn lookup_field<'a>(fields: &'a BTreeMap<String, FieldValue>, name: &str) -> Option<&'a FieldValue> {
    if let Some(v) = fields.get(name) {
        return Some(v);
    }
    let wanted = fold_header(name);
    fields
        .iter()
        .find(|(k, _)| fold_header(k) == wanted)
        .map(|(_, v)| v)
}

fn fold_header(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// The three collections one run reconciles.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub pos: Vec<Record>,
    pub program_a: Vec<Record>,
    pub program_b: Vec<Record>,
}

impl ReconInput {
    pub fn records(&self, source: Source) -> &[Record] {
        match source {
            Source::Pos => &self.pos,
            Source::ProgramA => &self.program_a,
            Source::ProgramB => &self.program_b,
        }
    }

    pub fn total_records(&self) -> usize {
        self.pos.len() + self.program_a.len() + self.program_b.len()
    }
}

// ---------------------------------------------------------------------------
// Match output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    AutoAccept,
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum UnmatchReason {
    /// Every identity field was empty.
    Unidentifiable,
    /// No acceptable candidate in either secondary source.
    NoCandidate,
    /// An acceptable candidate existed in one secondary only.
    PartialCorroboration { found_in: Source },
    /// Secondary record nobody claimed by the end of the run.
    Unclaimed,
}

impl std::fmt::Display for UnmatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unidentifiable => write!(f, "unidentifiable"),
            Self::NoCandidate => write!(f, "no_candidate"),
            Self::PartialCorroboration { found_in } => {
                write!(f, "partial_corroboration ({found_in})")
            }
            Self::Unclaimed => write!(f, "unclaimed"),
        }
    }
}

/// One record as it appears in a result: where it came from, the key it
/// normalized to, and its original fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRecord {
    pub source: Source,
    pub row: usize,
    pub key: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl MatchedRecord {
    pub fn reference(&self) -> RecordRef {
        RecordRef {
            source: self.source,
            row: self.row,
        }
    }

    /// Same header-tolerant lookup as [`Record::get`].
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        lookup_field(&self.fields, name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchResult {
    Exact {
        anchor: MatchedRecord,
        match_a: MatchedRecord,
        match_b: MatchedRecord,
    },
    Fuzzy {
        anchor: MatchedRecord,
        match_a: MatchedRecord,
        match_b: MatchedRecord,
        distance_a: usize,
        distance_b: usize,
        confidence: f64,
        review: ReviewStatus,
    },
    Unmatched {
        record: MatchedRecord,
        #[serde(flatten)]
        reason: UnmatchReason,
    },
}

impl MatchResult {
    /// Number of input records this entry accounts for.
    pub fn record_count(&self) -> usize {
        match self {
            Self::Exact { .. } | Self::Fuzzy { .. } => 3,
            Self::Unmatched { .. } => 1,
        }
    }

    pub fn records(&self) -> Vec<&MatchedRecord> {
        match self {
            Self::Exact {
                anchor,
                match_a,
                match_b,
            }
            | Self::Fuzzy {
                anchor,
                match_a,
                match_b,
                ..
            } => vec![anchor, match_a, match_b],
            Self::Unmatched { record, .. } => vec![record],
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Diagnostic {
    /// All identity fields empty; excluded from matching.
    InvalidRecord(RecordRef),
}

/// A key shared by more than one record inside a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub source: Source,
    pub key: String,
    pub rows: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total_records: usize,
    pub exact_count: usize,
    pub fuzzy_count: usize,
    pub unmatched_count: usize,
    pub match_rate_percent: u32,
    pub invalid_count: usize,
    pub needs_review_count: usize,
    pub duplicate_key_records: usize,
    pub unmatched_by_source: BTreeMap<Source, usize>,
    /// Mean confidence over exact (1.0) and fuzzy triples; `None` with no triples.
    pub avg_confidence: Option<f64>,
    /// Anchor amounts of exact and auto-accepted fuzzy triples; `None` unless
    /// an amount column is configured.
    pub recovered_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub primary: Source,
    pub threshold_mode: String,
    pub max_distance: f64,
    pub min_similarity: f64,
    pub amount_column: Option<String>,
    pub engine_version: String,
}

/// Immutable outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub results: Vec<MatchResult>,
    pub diagnostics: Vec<Diagnostic>,
    pub duplicates: Vec<DuplicateKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_spelling_tolerant() {
        let r = Record::new(Source::Pos, 0)
            .with("First Name", "Jane")
            .with("last_name", "Doe");
        assert_eq!(r.get("firstName"), Some(&FieldValue::from("Jane")));
        assert_eq!(r.get("LastName"), Some(&FieldValue::from("Doe")));
        assert_eq!(r.get("email"), None);
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(FieldValue::Number(5551234567.0).as_text(), "5551234567");
        assert_eq!(FieldValue::Number(12.5).as_text(), "12.5");
    }

    #[test]
    fn amounts_parse_leniently() {
        assert_eq!(FieldValue::from("450").as_amount(), Some(450.0));
        assert_eq!(FieldValue::from(" $1,250.50 ").as_amount(), Some(1250.5));
        assert_eq!(FieldValue::Number(99.0).as_amount(), Some(99.0));
        assert_eq!(FieldValue::from("").as_amount(), None);
        assert_eq!(FieldValue::from("n/a").as_amount(), None);
        assert_eq!(FieldValue::Number(f64::NAN).as_amount(), None);
    }

    #[test]
    fn invalid_record_diagnostic_is_flat() {
        let diag = Diagnostic::InvalidRecord(RecordRef {
            source: Source::ProgramB,
            row: 4,
        });
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "invalid_record", "source": "programB", "row": 4})
        );
    }

    #[test]
    fn secondaries_exclude_primary() {
        assert_eq!(Source::Pos.secondaries(), [Source::ProgramA, Source::ProgramB]);
        assert_eq!(Source::ProgramB.secondaries(), [Source::Pos, Source::ProgramA]);
    }

    #[test]
    fn unmatched_serializes_reason_inline() {
        let result = MatchResult::Unmatched {
            record: MatchedRecord {
                source: Source::ProgramA,
                row: 3,
                key: "x".into(),
                fields: BTreeMap::new(),
            },
            reason: UnmatchReason::PartialCorroboration {
                found_in: Source::ProgramB,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "unmatched");
        assert_eq!(json["reason"], "partial_corroboration");
        assert_eq!(json["found_in"], "programB");
        assert_eq!(json["record"]["source"], "programA");
    }
}
