//! `tally run` and `tally validate`: config-driven three-source reconciliation.

use std::path::{Path, PathBuf};

use tally_recon::{ReconConfig, ReconError};

use crate::exit_codes::{EXIT_RECON_INVALID_CONFIG, EXIT_RECON_REVIEW, EXIT_RECON_RUNTIME};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn config_err(e: ReconError) -> CliError {
    let hint = match &e {
        ReconError::InvalidThreshold { .. } => {
            Some("set [match] max_distance > 0 and min_similarity in (0, 1]".to_string())
        }
        ReconError::EmptyIdentityFields => {
            Some("add at least one [[match.identity]] entry, or remove the key for defaults".to_string())
        }
        _ => None,
    };
    CliError { code: EXIT_RECON_INVALID_CONFIG, message: e.to_string(), hint }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(config_err)
}

pub fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let input = tally_recon::load_input(&config, base_dir).map_err(|e| match e {
        ReconError::MissingSource(_) => config_err(e),
        other => recon_err(EXIT_RECON_RUNTIME, other.to_string()),
    })?;

    let report = tally_recon::run(&config, &input).map_err(config_err)?;

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &report.summary;
    eprintln!(
        "recon '{}': {} records: {} exact, {} fuzzy ({} need review), {} unmatched, {}% matched",
        report.meta.config_name,
        s.total_records,
        s.exact_count,
        s.fuzzy_count,
        s.needs_review_count,
        s.unmatched_count,
        s.match_rate_percent,
    );
    if let Some(avg) = s.avg_confidence {
        eprintln!("  average match confidence {:.2}", avg);
    }
    if let Some(amount) = s.recovered_amount {
        eprintln!("  recovered {:.2} across exact and auto-accepted matches", amount);
    }
    if s.invalid_count > 0 {
        eprintln!("  {} record(s) had no identity fields and were excluded", s.invalid_count);
    }
    if s.duplicate_key_records > 0 {
        eprintln!(
            "  {} record(s) share a key with another record in the same source",
            s.duplicate_key_records
        );
    }

    if s.unmatched_count > 0 || s.needs_review_count > 0 {
        return Err(recon_err(EXIT_RECON_REVIEW, "records need manual review"));
    }

    Ok(())
}

pub fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let configured = tally_recon::Source::ALL
        .iter()
        .filter(|s| config.sources.get(**s).is_some())
        .count();
    eprintln!(
        "valid: recon '{}' (primary {}, {} mode, max distance {}) with {} source file(s), {} identity field(s)",
        config.name,
        config.primary,
        config.matching.mode,
        config.matching.max_distance,
        configured,
        config.matching.identity.len(),
    );
    Ok(())
}
