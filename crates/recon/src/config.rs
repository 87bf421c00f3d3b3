use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::Source;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Anchor source; the other two are the secondaries.
    #[serde(default = "default_primary")]
    pub primary: Source,
    /// File locations, only needed when loading from disk.
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default, rename = "match")]
    pub matching: MatchConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            primary: default_primary(),
            sources: SourcesConfig::default(),
            matching: MatchConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

fn default_name() -> String {
    "reconciliation".into()
}

fn default_primary() -> Source {
    Source::Pos
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SourcesConfig {
    #[serde(default)]
    pub pos: Option<SourceConfig>,
    #[serde(default)]
    pub program_a: Option<SourceConfig>,
    #[serde(default)]
    pub program_b: Option<SourceConfig>,
}

impl SourcesConfig {
    pub fn get(&self, source: Source) -> Option<&SourceConfig> {
        match source {
            Source::Pos => self.pos.as_ref(),
            Source::ProgramA => self.program_a.as_ref(),
            Source::ProgramB => self.program_b.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub file: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    #[serde(default)]
    pub mode: ThresholdMode,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_swap_comma_names")]
    pub swap_comma_names: bool,
    #[serde(default = "default_identity")]
    pub identity: Vec<IdentityField>,
    /// Column holding the redemption amount on anchor records. When set, the
    /// summary reports the amount recovered by confident matches.
    #[serde(default)]
    pub amount_column: Option<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::default(),
            max_distance: default_max_distance(),
            min_similarity: default_min_similarity(),
            swap_comma_names: default_swap_comma_names(),
            identity: default_identity(),
            amount_column: None,
        }
    }
}

fn default_max_distance() -> f64 {
    5.0
}

fn default_min_similarity() -> f64 {
    0.8
}

fn default_swap_comma_names() -> bool {
    true
}

fn default_identity() -> Vec<IdentityField> {
    vec![
        IdentityField {
            label: "name".into(),
            any_of: vec![
                vec!["firstName".into(), "lastName".into()],
                vec!["name".into()],
            ],
        },
        IdentityField {
            label: "contact".into(),
            any_of: vec![vec!["email".into()], vec!["phone".into()]],
        },
    ]
}

/// How a fuzzy candidate's distance is judged against the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// `distance <= max_distance`.
    #[default]
    Distance,
    /// `similarity_ratio >= min_similarity`.
    Ratio,
    /// Either test passes.
    Either,
    /// Both tests pass.
    Both,
}

impl std::fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Distance => write!(f, "distance"),
            Self::Ratio => write!(f, "ratio"),
            Self::Either => write!(f, "either"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// One slot of the canonical key. Alternatives are tried in order; each
/// alternative is a list of columns joined with a space. The first
/// alternative that yields a non-empty value fills the slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityField {
    pub label: String,
    pub any_of: Vec<Vec<String>>,
}

impl IdentityField {
    /// Single-column slot, e.g. `IdentityField::column("email")`.
    pub fn column(name: &str) -> Self {
        Self {
            label: name.into(),
            any_of: vec![vec![name.into()]],
        }
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Fuzzy matches at or above this confidence need no human review.
    #[serde(default = "default_auto_accept")]
    pub auto_accept: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_accept: default_auto_accept(),
        }
    }
}

fn default_auto_accept() -> f64 {
    0.95
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let m = &self.matching;

        if !m.max_distance.is_finite() {
            return Err(ReconError::InvalidThreshold {
                name: "max_distance",
                value: m.max_distance,
                reason: "must be finite",
            });
        }
        if m.max_distance <= 0.0 {
            return Err(ReconError::InvalidThreshold {
                name: "max_distance",
                value: m.max_distance,
                reason: "must be greater than zero",
            });
        }
        if !m.min_similarity.is_finite() || m.min_similarity <= 0.0 || m.min_similarity > 1.0 {
            return Err(ReconError::InvalidThreshold {
                name: "min_similarity",
                value: m.min_similarity,
                reason: "must be in (0, 1]",
            });
        }

        if m.identity.is_empty() {
            return Err(ReconError::EmptyIdentityFields);
        }
        for field in &m.identity {
            if field.any_of.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "identity field '{}' has no alternatives",
                    field.label
                )));
            }
            for alt in &field.any_of {
                if alt.is_empty() || alt.iter().any(|c| c.trim().is_empty()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "identity field '{}' has an empty column list or column name",
                        field.label
                    )));
                }
            }
        }

        if m.amount_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "match.amount_column must name a column".into(),
            ));
        }

        let auto = self.review.auto_accept;
        if !auto.is_finite() || !(0.0..=1.0).contains(&auto) {
            return Err(ReconError::ConfigValidation(format!(
                "review.auto_accept must be in [0, 1], got {auto}"
            )));
        }

        Ok(())
    }

    /// File entry for a source, required for disk-driven runs.
    pub fn source(&self, source: Source) -> Result<&SourceConfig, ReconError> {
        self.sources
            .get(source)
            .ok_or(ReconError::MissingSource(source))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "March redemptions"
primary = "pos"

[sources.pos]
file = "pos.csv"

[sources.programA]
file = "alle.csv"

[sources.programB]
file = "aspire.csv"
delimiter = ";"

[match]
mode = "either"
max_distance = 3
min_similarity = 0.85
swap_comma_names = false
amount_column = "Amount"

[[match.identity]]
label = "name"
any_of = [["first", "last"]]

[[match.identity]]
label = "contact"
any_of = [["email"], ["phone"]]

[review]
auto_accept = 0.9
"#;

    #[test]
    fn parse_full() {
        let config = ReconConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "March redemptions");
        assert_eq!(config.primary, Source::Pos);
        assert_eq!(config.source(Source::Pos).unwrap().file, "pos.csv");
        assert_eq!(config.source(Source::ProgramB).unwrap().delimiter, ';');
        assert_eq!(config.source(Source::ProgramA).unwrap().delimiter, ',');
        assert_eq!(config.matching.mode, ThresholdMode::Either);
        assert_eq!(config.matching.max_distance, 3.0);
        assert!(!config.matching.swap_comma_names);
        assert_eq!(config.matching.identity.len(), 2);
        assert_eq!(config.matching.identity[0].any_of, vec![vec!["first", "last"]]);
        assert_eq!(config.matching.amount_column.as_deref(), Some("Amount"));
        assert_eq!(config.review.auto_accept, 0.9);
    }

    #[test]
    fn reject_blank_amount_column() {
        let err = ReconConfig::from_toml("[match]\namount_column = \"  \"\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(ref m) if m.contains("amount_column")));
    }

    #[test]
    fn defaults_apply_to_empty_document() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.primary, Source::Pos);
        assert_eq!(config.matching.mode, ThresholdMode::Distance);
        assert_eq!(config.matching.max_distance, 5.0);
        assert_eq!(config.matching.min_similarity, 0.8);
        assert!(config.matching.swap_comma_names);
        assert_eq!(config.matching.identity[0].label, "name");
        assert_eq!(config.matching.identity[1].any_of.len(), 2);
        assert_eq!(config.review.auto_accept, 0.95);
        assert_eq!(config.matching.amount_column, None);
        assert!(config.source(Source::Pos).is_err());
    }

    #[test]
    fn reject_zero_threshold() {
        let err = ReconConfig::from_toml("[match]\nmax_distance = 0\n").unwrap_err();
        assert!(matches!(err, ReconError::InvalidThreshold { name: "max_distance", .. }));
    }

    #[test]
    fn reject_negative_threshold() {
        let err = ReconConfig::from_toml("[match]\nmax_distance = -2\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn reject_non_finite_threshold() {
        let err = ReconConfig::from_toml("[match]\nmax_distance = inf\n").unwrap_err();
        assert!(err.to_string().contains("finite"));
        let err = ReconConfig::from_toml("[match]\nmin_similarity = nan\n").unwrap_err();
        assert!(err.to_string().contains("min_similarity"));
    }

    #[test]
    fn reject_empty_identity() {
        let err = ReconConfig::from_toml("[match]\nidentity = []\n").unwrap_err();
        assert!(matches!(err, ReconError::EmptyIdentityFields));
    }

    #[test]
    fn reject_empty_alternative() {
        let input = r#"
[[match.identity]]
label = "name"
any_of = [[]]
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn reject_unknown_source() {
        let input = r#"
[sources.programC]
file = "x.csv"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_auto_accept_out_of_range() {
        let err = ReconConfig::from_toml("[review]\nauto_accept = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("auto_accept"));
    }
}
