//! Response payload for one analysis request.

use crate::llm_client::Explanation;
use crate::types::{ExplanationMode, Recommendation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: String,
    pub severity: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacogenomicProfile {
    pub gene: Option<String>,
    pub phenotype: Option<String>,
    pub detected_variant: Option<String>,
    pub total_variants_found: usize,
    pub signature_hash: String,
}

/// drug -> gene -> variant -> phenotype -> risk -> recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainabilityTree {
    pub drug: String,
    pub gene: Option<String>,
    pub variant: Option<String>,
    pub phenotype: Option<String>,
    pub risk: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub vcf_quality: String,
    pub genotype_completeness: String,
}

impl QualityMetrics {
    /// Heuristic only: completeness is "High" as soon as any target variant was found
    pub fn for_variant_count(total_variants: usize) -> Self {
        Self {
            vcf_quality: "PASS".to_string(),
            genotype_completeness: if total_variants > 0 { "High" } else { "Low" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub patient_id: String,
    pub drug: String,
    /// RFC 3339, set when the response is sent
    pub timestamp: String,
    pub mode: ExplanationMode,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    pub clinical_recommendation: String,
    pub llm_generated_explanation: Explanation,
    pub explainability_tree: ExplainabilityTree,
    pub genomic_signature_id: String,
    pub quality_metrics: QualityMetrics,
    pub cache_status: CacheStatus,
}

/// Inputs for [`AnalysisReport::assemble`]
pub struct ReportInput<'a> {
    pub patient_id: String,
    pub timestamp: String,
    /// Already uppercased
    pub drug: &'a str,
    pub mode: ExplanationMode,
    pub recommendation: &'a Recommendation,
    pub total_variants: usize,
    pub signature: &'a str,
    pub explanation: Explanation,
}

impl AnalysisReport {
    /// Freshly computed report; always a cache miss
    pub fn assemble(input: ReportInput<'_>) -> Self {
        let rec = input.recommendation;

        Self {
            patient_id: input.patient_id,
            drug: input.drug.to_string(),
            timestamp: input.timestamp,
            mode: input.mode,
            risk_assessment: RiskAssessment {
                level: rec.risk_label.clone(),
                severity: rec.severity.clone(),
                confidence_score: rec.confidence_score,
            },
            pharmacogenomic_profile: PharmacogenomicProfile {
                gene: rec.gene.clone(),
                phenotype: rec.phenotype.clone(),
                detected_variant: rec.detected_variant.clone(),
                total_variants_found: input.total_variants,
                signature_hash: input.signature.to_string(),
            },
            clinical_recommendation: rec.recommendation.clone(),
            llm_generated_explanation: input.explanation,
            explainability_tree: ExplainabilityTree {
                drug: input.drug.to_string(),
                gene: rec.gene.clone(),
                variant: rec.detected_variant.clone(),
                phenotype: rec.phenotype.clone(),
                risk: rec.risk_label.clone(),
                recommendation: rec.recommendation.clone(),
            },
            genomic_signature_id: input.signature.to_string(),
            quality_metrics: QualityMetrics::for_variant_count(input.total_variants),
            cache_status: CacheStatus::Miss,
        }
    }

    /// Turn a stored report into a cache-hit response: new score and
    /// timestamp, everything else untouched.
    pub fn into_cache_hit(mut self, confidence_score: f64, timestamp: String) -> Self {
        self.risk_assessment.confidence_score = confidence_score;
        self.timestamp = timestamp;
        self.cache_status = CacheStatus::Hit;
        self
    }
}
