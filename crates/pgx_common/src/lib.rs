//! PGx common library - data model, VCF parsing, rule evaluation and
//! explanation generation shared by the daemon and its tests.

pub mod llm_client;
pub mod prompts;
pub mod report;
pub mod rules;
pub mod signature;
pub mod tables;
pub mod types;
pub mod vcf;

pub use llm_client::{
    explain, Explanation, ExplanationClient, FakeExplanationClient, HttpExplanationClient,
    LlmConfig, LlmError, FAILURE_MARKER, FALLBACK_EXPLANATION,
};
pub use report::AnalysisReport;
pub use rules::{ConfidenceSource, FixedConfidence, JitterConfidence, RuleEngine};
pub use signature::{signature, variant_signature};
pub use tables::{LookupTables, PhenotypeRule, TableError};
pub use types::{ClinicalContext, ExplanationMode, ParsedVariant, Recommendation};
pub use vcf::{parse_vcf, TARGET_GENES};
