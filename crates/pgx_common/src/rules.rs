//! Rule engine: drug + detected variants -> clinical recommendation.
//!
//! Resolution order:
//! 1. drug -> gene (drug table)
//! 2. first variant on that gene whose star allele, then rsID, maps to a phenotype
//! 3. (drug, phenotype) -> rule
//!
//! Missing data at any step yields an "Unknown" recommendation with a graded
//! confidence score instead of an error. Single-variant lookup stands in for
//! diplotype calling; VCF line order decides which variant wins.

use crate::tables::LookupTables;
use crate::types::{ParsedVariant, Recommendation, UNKNOWN_RISK};
use rand::Rng;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

pub const REASON_UNSUPPORTED_DRUG: &str = "Drug not supported or mapped to a gene.";
pub const REASON_NO_VARIANTS: &str = "No pharmacogenomic variants detected for this drug/gene pair.";
pub const REASON_NO_RULES: &str = "No rules defined for this drug.";
pub const UNKNOWN_PHENOTYPE_IMPACT: &str = "Unknown Phenotype Impact";

pub const CONFIDENCE_NO_MAPPING: f64 = 0.1;
pub const CONFIDENCE_NO_VARIANTS: f64 = 0.2;
pub const CONFIDENCE_PARTIAL_MATCH: f64 = 0.7;

/// Band for fully matched rules; redrawn on every response
pub const HIGH_CONFIDENCE_RANGE: Range<f64> = 0.90..0.95;

/// Source of the confidence score reported for a fully matched rule
pub trait ConfidenceSource: Send + Sync {
    /// Value in `HIGH_CONFIDENCE_RANGE`
    fn draw(&self) -> f64;
}

/// Uniform draw from `HIGH_CONFIDENCE_RANGE`
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterConfidence;

impl ConfidenceSource for JitterConfidence {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen_range(HIGH_CONFIDENCE_RANGE)
    }
}

/// Always returns the same score (tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f64);

impl ConfidenceSource for FixedConfidence {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Phenotype match for one gene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhenotypeMatch {
    pub phenotype: String,
    /// Star allele or rsID that produced the match
    pub detected_variant: String,
}

pub struct RuleEngine {
    tables: Arc<LookupTables>,
    confidence: Arc<dyn ConfidenceSource>,
}

impl RuleEngine {
    pub fn new(tables: Arc<LookupTables>, confidence: Arc<dyn ConfidenceSource>) -> Self {
        Self { tables, confidence }
    }

    /// Engine with production jitter
    pub fn with_tables(tables: Arc<LookupTables>) -> Self {
        Self::new(tables, Arc::new(JitterConfidence))
    }

    pub fn supported_drugs(&self) -> Vec<String> {
        self.tables.drugs()
    }

    /// Fresh high-confidence score, also used to refresh cached responses
    pub fn fresh_confidence(&self) -> f64 {
        self.confidence.draw()
    }

    /// Evaluate a drug (any case) against every variant parsed from the file
    pub fn evaluate(&self, drug: &str, variants: &[ParsedVariant]) -> Recommendation {
        let drug = drug.to_uppercase();

        let Some(gene) = self.tables.gene_for_drug(&drug) else {
            debug!("No gene mapping for {}", drug);
            return Recommendation::unknown(REASON_UNSUPPORTED_DRUG, CONFIDENCE_NO_MAPPING);
        };

        let Some(found) = self.match_phenotype(gene, variants) else {
            debug!("No {} variant with a known phenotype", gene);
            return Recommendation::unknown(REASON_NO_VARIANTS, CONFIDENCE_NO_VARIANTS);
        };

        let Some(rules) = self.tables.rules_for_drug(&drug) else {
            return Recommendation::unknown(REASON_NO_RULES, CONFIDENCE_NO_MAPPING);
        };

        match rules.get(&found.phenotype) {
            Some(rule) => Recommendation {
                risk_label: rule.risk_label.clone(),
                severity: rule.severity.clone(),
                recommendation: rule.recommendation.clone(),
                phenotype: Some(found.phenotype),
                gene: Some(gene.to_string()),
                detected_variant: Some(found.detected_variant),
                confidence_score: self.confidence.draw(),
            },
            None => Recommendation {
                risk_label: UNKNOWN_RISK.to_string(),
                severity: "low".to_string(),
                recommendation: UNKNOWN_PHENOTYPE_IMPACT.to_string(),
                phenotype: Some(found.phenotype),
                gene: Some(gene.to_string()),
                detected_variant: Some(found.detected_variant),
                confidence_score: CONFIDENCE_PARTIAL_MATCH,
            },
        }
    }

    /// First variant on `gene`, in file order, whose star allele or else rsID
    /// appears in the gene's variant table.
    pub fn match_phenotype(&self, gene: &str, variants: &[ParsedVariant]) -> Option<PhenotypeMatch> {
        let table = self.tables.variant_phenotypes(gene)?;

        variants.iter().filter(|v| v.gene == gene).find_map(|v| {
            let by_star = v
                .star_allele
                .as_ref()
                .and_then(|star| table.get(star).map(|p| (p, star)));
            let by_rs = || {
                Some(&v.rs_id)
                    .filter(|id| !id.is_empty())
                    .and_then(|id| table.get(id).map(|p| (p, id)))
            };

            by_star.or_else(by_rs).map(|(phenotype, id)| PhenotypeMatch {
                phenotype: phenotype.clone(),
                detected_variant: id.clone(),
            })
        })
    }
}
