use std::path::Path;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::index::KeyIndex;
use crate::matcher::{match_sources, MatchPolicy};
use crate::model::{Diagnostic, FieldValue, ReconInput, ReconMeta, ReconciliationReport, Record, Source};
use crate::normalize::KeySpec;
use crate::report::aggregate;
use crate::scoring::{ConfidenceScorer, ThresholdConfidence};
use crate::similarity::Threshold;

/// Run reconciliation per config, scoring confidence on the same measure the
/// threshold mode accepts candidates by.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconciliationReport, ReconError> {
    let scorer = ThresholdConfidence {
        threshold: Threshold::from_config(&config.matching),
    };
    run_with_scorer(config, input, &scorer)
}

/// Run reconciliation with a caller-supplied confidence scorer.
///
/// Config is validated before any index is built; an invalid config never
/// yields a partial report.
pub fn run_with_scorer(
    config: &ReconConfig,
    input: &ReconInput,
    scorer: &dyn ConfidenceScorer,
) -> Result<ReconciliationReport, ReconError> {
    config.validate()?;

    let span = tracing::info_span!(
        "reconcile",
        name = %config.name,
        primary = %config.primary,
        records = input.total_records(),
    );
    let _guard = span.enter();

    let spec = KeySpec {
        identity: config.matching.identity.clone(),
        swap_comma_names: config.matching.swap_comma_names,
    };

    let [sec_a, sec_b] = config.primary.secondaries();
    let mut primary = KeyIndex::build(config.primary, input.records(config.primary), &spec);
    let mut secondary_a = KeyIndex::build(sec_a, input.records(sec_a), &spec);
    let mut secondary_b = KeyIndex::build(sec_b, input.records(sec_b), &spec);

    let mut diagnostics = Vec::new();
    let mut duplicates = Vec::new();
    for index in [&primary, &secondary_a, &secondary_b] {
        diagnostics.extend(
            index
                .invalid_rows()
                .map(|row| Diagnostic::InvalidRecord(index.reference(row))),
        );
        for dup in index.duplicates() {
            tracing::warn!(
                source = %dup.source,
                key = %dup.key,
                rows = dup.rows.len(),
                "duplicate key within source"
            );
            duplicates.push(dup);
        }
    }

    let policy = MatchPolicy {
        threshold: Threshold::from_config(&config.matching),
        auto_accept: config.review.auto_accept,
        scorer,
    };
    let results = match_sources(input, &mut primary, &mut secondary_a, &mut secondary_b, &policy);

    let meta = ReconMeta {
        config_name: config.name.clone(),
        primary: config.primary,
        threshold_mode: config.matching.mode.to_string(),
        max_distance: config.matching.max_distance,
        min_similarity: config.matching.min_similarity,
        amount_column: config.matching.amount_column.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let report = aggregate(meta, results, diagnostics, duplicates);

    let s = &report.summary;
    tracing::info!(
        exact = s.exact_count,
        fuzzy = s.fuzzy_count,
        unmatched = s.unmatched_count,
        invalid = s.invalid_count,
        match_rate = s.match_rate_percent,
        needs_review = s.needs_review_count,
        "reconciliation complete"
    );

    Ok(report)
}

/// Load one source's CSV export into records. Every column becomes a text
/// field; the header row names them.
pub fn load_csv_records(
    source: Source,
    csv_data: &str,
    delimiter: char,
) -> Result<Vec<Record>, ReconError> {
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        ReconError::ConfigValidation(format!(
            "source '{source}': delimiter '{delimiter}' must be a single-byte character"
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let csv_err = |e: csv::Error| ReconError::Csv {
        source_name: source,
        message: e.to_string(),
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = result.map_err(csv_err)?;
        let mut record = Record::new(source, row);
        for (i, h) in headers.iter().enumerate() {
            if let Some(val) = line.get(i) {
                record.fields.insert(h.clone(), FieldValue::Text(val.to_string()));
            }
        }
        records.push(record);
    }

    Ok(records)
}

/// Read all three source files named in the config, resolving paths
/// relative to `base_dir`.
pub fn load_input(config: &ReconConfig, base_dir: &Path) -> Result<ReconInput, ReconError> {
    let load = |source: Source| -> Result<Vec<Record>, ReconError> {
        let sc = config.source(source)?;
        let path = base_dir.join(&sc.file);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        let records = load_csv_records(source, &data, sc.delimiter)?;
        tracing::debug!(%source, path = %path.display(), rows = records.len(), "loaded source");
        Ok(records)
    };

    Ok(ReconInput {
        pos: load(Source::Pos)?,
        program_a: load(Source::ProgramA)?,
        program_b: load(Source::ProgramB)?,
    })
}
