//! Analysis pipeline: VCF text + drug + mode -> response payload.
//!
//! parse -> signature -> cache lookup -> (miss) rules -> explanation -> store

use crate::cache::cache_key;
use crate::server::AppState;
use pgx_common::report::ReportInput;
use pgx_common::{
    explain, parse_vcf, variant_signature, AnalysisReport, ClinicalContext, ExplanationMode,
};
use tracing::info;
use uuid::Uuid;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_patient_id() -> String {
    format!("PATIENT_{}", Uuid::new_v4().simple()).to_uppercase()
}

/// Run one analysis request end to end. Never fails: missing data becomes an
/// "Unknown" recommendation and generation failures become fallback text.
pub async fn analyze(
    state: &AppState,
    vcf_text: &str,
    drug: &str,
    mode: ExplanationMode,
) -> AnalysisReport {
    let drug = drug.trim().to_uppercase();
    let variants = parse_vcf(vcf_text);
    let signature = variant_signature(&variants);
    let key = cache_key(&signature, &drug, mode);

    info!(
        "[ANALYZE] drug={} mode={} variants={} signature={}",
        drug,
        mode,
        variants.len(),
        &signature[..12]
    );

    if let Some(cached) = state.cache.get(&key).await {
        info!("[CACHE] HIT {}", key);
        return cached.into_cache_hit(state.engine.fresh_confidence(), now_rfc3339());
    }
    info!("[CACHE] MISS {}", key);

    let recommendation = state.engine.evaluate(&drug, &variants);
    let context = ClinicalContext::from_recommendation(&recommendation, &drug, mode);
    let explanation = explain(state.explainer.as_ref(), &context, state.explain_timeout).await;

    let report = AnalysisReport::assemble(ReportInput {
        patient_id: new_patient_id(),
        timestamp: now_rfc3339(),
        drug: &drug,
        mode,
        recommendation: &recommendation,
        total_variants: variants.len(),
        signature: &signature,
        explanation,
    });

    if !state.cache.set(key, report.clone()).await {
        info!("[CACHE] not stored: explanation generation failed");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgx_common::report::CacheStatus;
    use pgx_common::rules::HIGH_CONFIDENCE_RANGE;
    use pgx_common::{
        ConfidenceSource, Explanation, FakeExplanationClient, FixedConfidence, LlmError,
        LookupTables, Recommendation, RuleEngine,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Hands out scores in order; the last one repeats
    struct ScriptedConfidence(Mutex<Vec<f64>>);

    impl ConfidenceSource for ScriptedConfidence {
        fn draw(&self) -> f64 {
            let mut scores = self.0.lock().unwrap();
            if scores.len() > 1 {
                scores.remove(0)
            } else {
                scores[0]
            }
        }
    }

    const VCF: &str = "##fileformat=VCFv4.2\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
        chr10\t96541616\trs4244285\tG\tA\t.\t.\tGENE=CYP2C19;STAR=*2\n";

    fn state(client: Arc<FakeExplanationClient>) -> AppState {
        let engine = RuleEngine::with_tables(Arc::new(LookupTables::builtin().unwrap()));
        AppState::new(engine, client, Duration::from_secs(1), 100)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let client = Arc::new(FakeExplanationClient::always_ok("Clopidogrel will not work well."));
        let state = state(client.clone());

        let first = analyze(&state, VCF, "clopidogrel", ExplanationMode::Patient).await;
        let second = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;

        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(client.call_count(), 1);

        assert_eq!(first.drug, "CLOPIDOGREL");
        assert_eq!(first.risk_assessment.level, "HIGH");
        assert_eq!(first.pharmacogenomic_profile.detected_variant.as_deref(), Some("*2"));
        assert!(HIGH_CONFIDENCE_RANGE.contains(&first.risk_assessment.confidence_score));
        assert!(HIGH_CONFIDENCE_RANGE.contains(&second.risk_assessment.confidence_score));

        assert_eq!(second.patient_id, first.patient_id);
        assert_eq!(second.pharmacogenomic_profile, first.pharmacogenomic_profile);
        assert_eq!(second.explainability_tree, first.explainability_tree);
        assert_eq!(second.llm_generated_explanation, first.llm_generated_explanation);
        assert_eq!(second.genomic_signature_id, first.genomic_signature_id);
    }

    #[tokio::test]
    async fn test_hit_redraws_confidence() {
        let client = Arc::new(FakeExplanationClient::always_ok("Explained."));
        let engine = RuleEngine::new(
            Arc::new(LookupTables::builtin().unwrap()),
            Arc::new(ScriptedConfidence(Mutex::new(vec![0.91, 0.94]))),
        );
        let state = AppState::new(engine, client, Duration::from_secs(1), 100);

        let first = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;
        let second = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;

        assert_eq!(first.risk_assessment.confidence_score, 0.91);
        assert_eq!(second.risk_assessment.confidence_score, 0.94);

        // Everything but score, timestamp and status is the stored payload
        let expected = first.into_cache_hit(0.94, second.timestamp.clone());
        assert_eq!(second, expected);
    }

    #[tokio::test]
    async fn test_stale_failure_entry_regenerates() {
        let client = Arc::new(FakeExplanationClient::always_ok("Fresh explanation."));
        let state = state(client.clone());

        let signature = variant_signature(&parse_vcf(VCF));
        let key = cache_key(&signature, "CLOPIDOGREL", ExplanationMode::Patient);
        let rec = Recommendation::unknown("No rules defined for this drug.", 0.1);
        let stale = AnalysisReport::assemble(ReportInput {
            patient_id: "PATIENT_STALE".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            drug: "CLOPIDOGREL",
            mode: ExplanationMode::Patient,
            recommendation: &rec,
            total_variants: 1,
            signature: &signature,
            explanation: Explanation::fallback(),
        });
        state.cache.insert_unchecked(key.clone(), stale).await;

        let report = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;

        assert_eq!(report.cache_status, CacheStatus::Miss);
        assert_ne!(report.patient_id, "PATIENT_STALE");
        assert_eq!(report.llm_generated_explanation.summary, "Fresh explanation.");
        assert_eq!(client.call_count(), 1);

        let stored = state.cache.get(&key).await.unwrap();
        assert_eq!(stored.patient_id, report.patient_id);
    }

    #[tokio::test]
    async fn test_modes_cached_separately() {
        let client = Arc::new(FakeExplanationClient::always_ok("Explained."));
        let state = state(client.clone());

        analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;
        let expert = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Expert).await;

        assert_eq!(expert.cache_status, CacheStatus::Miss);
        assert_eq!(client.call_count(), 2);
        assert_eq!(state.cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_generation_not_cached() {
        let client = Arc::new(FakeExplanationClient::new(vec![
            Err(LlmError::HttpError("502".to_string())),
            Ok("Recovered.".to_string()),
        ]));
        let state = state(client.clone());

        let first = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;
        assert!(first.llm_generated_explanation.is_failure());
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert!(state.cache.is_empty().await);

        let second = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;
        assert_eq!(second.cache_status, CacheStatus::Miss);
        assert_eq!(second.llm_generated_explanation.summary, "Recovered.");

        let third = analyze(&state, VCF, "CLOPIDOGREL", ExplanationMode::Patient).await;
        assert_eq!(third.cache_status, CacheStatus::Hit);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_drug_report() {
        let client = Arc::new(FakeExplanationClient::always_ok("No data for this drug."));
        let engine = RuleEngine::new(
            Arc::new(LookupTables::builtin().unwrap()),
            Arc::new(FixedConfidence(0.93)),
        );
        let state = AppState::new(engine, client, Duration::from_secs(1), 100);

        let report = analyze(&state, VCF, "aspirin", ExplanationMode::Expert).await;
        assert_eq!(report.risk_assessment.level, "Unknown");
        assert_eq!(report.risk_assessment.confidence_score, 0.1);
        assert_eq!(report.pharmacogenomic_profile.total_variants_found, 1);
        assert!(report.pharmacogenomic_profile.gene.is_none());
        assert_eq!(report.quality_metrics.genotype_completeness, "High");
    }

    #[tokio::test]
    async fn test_empty_vcf() {
        let client = Arc::new(FakeExplanationClient::always_ok("Nothing found."));
        let state = state(client);

        let report = analyze(&state, "", "WARFARIN", ExplanationMode::Patient).await;
        assert_eq!(report.risk_assessment.confidence_score, 0.2);
        assert_eq!(report.pharmacogenomic_profile.total_variants_found, 0);
        assert_eq!(report.quality_metrics.genotype_completeness, "Low");
        assert_eq!(
            report.genomic_signature_id,
            pgx_common::signature::<&str>(&[])
        );
    }

    #[test]
    fn test_patient_ids_unique() {
        let a = new_patient_id();
        let b = new_patient_id();
        assert!(a.starts_with("PATIENT_"));
        assert_ne!(a, b);
    }
}
