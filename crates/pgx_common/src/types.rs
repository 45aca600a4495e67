//! Core data model shared by the parser, rule engine and daemon.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Risk label used whenever no mapping, variant match or rule applies.
pub const UNKNOWN_RISK: &str = "Unknown";

/// One VCF data line that survived the pharmacogene filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedVariant {
    pub gene: String,
    /// ID column, empty when the column was `.` or blank
    pub rs_id: String,
    /// `STAR` INFO value, if the line carried one
    pub star_allele: Option<String>,
    pub chromosome: String,
    pub position: String,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    #[serde(rename = "alt")]
    pub alt_allele: String,
    /// INFO key/value pairs; bare flags map to `"true"`
    pub info: HashMap<String, String>,
}

/// Output of the rule engine for one drug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub risk_label: String,
    pub severity: String,
    pub recommendation: String,
    pub phenotype: Option<String>,
    pub gene: Option<String>,
    pub detected_variant: Option<String>,
    pub confidence_score: f64,
}

impl Recommendation {
    /// Build an "Unknown" outcome carrying the reason as its recommendation text
    pub fn unknown(reason: &str, confidence_score: f64) -> Self {
        Self {
            risk_label: UNKNOWN_RISK.to_string(),
            severity: "unknown".to_string(),
            recommendation: reason.to_string(),
            phenotype: None,
            gene: None,
            detected_variant: None,
            confidence_score,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.risk_label == UNKNOWN_RISK
    }
}

/// Audience of the generated explanation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationMode {
    #[default]
    Patient,
    Expert,
}

impl ExplanationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationMode::Patient => "patient",
            ExplanationMode::Expert => "expert",
        }
    }

    /// Parse a request value; anything other than `expert` is patient mode.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "expert" => ExplanationMode::Expert,
            _ => ExplanationMode::Patient,
        }
    }
}

impl std::fmt::Display for ExplanationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the explanation generator is told about one result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalContext {
    pub drug: String,
    pub gene: String,
    pub phenotype: String,
    pub variant: String,
    pub risk_level: String,
    pub recommendation: String,
    pub mode: ExplanationMode,
}

impl ClinicalContext {
    pub fn from_recommendation(rec: &Recommendation, drug: &str, mode: ExplanationMode) -> Self {
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| UNKNOWN_RISK.to_string());
        Self {
            drug: drug.to_uppercase(),
            gene: or_unknown(&rec.gene),
            phenotype: or_unknown(&rec.phenotype),
            variant: rec
                .detected_variant
                .clone()
                .unwrap_or_else(|| "None detected".to_string()),
            risk_level: rec.risk_label.clone(),
            recommendation: rec.recommendation.clone(),
            mode,
        }
    }
}
