//! Prompt text for explanation generation.

use crate::types::{ClinicalContext, ExplanationMode};

const EXPERT_SYSTEM: &str = "You are a clinical pharmacogenomics consultant. \
Write for physicians and pharmacists. Be precise and technical: name the enzyme or \
transporter, the functional consequence of the variant, and how it changes drug \
exposure or activation. Reference CPIC-style guidance where relevant. \
Do not invent variants or phenotypes that are not listed.";

const PATIENT_SYSTEM: &str = "You explain genetic test results to patients. \
Use plain, calm language a non-specialist can follow. Avoid jargon, or explain it \
in one short phrase when unavoidable. Do not give dosing instructions; encourage \
the reader to discuss the result with their doctor or pharmacist. \
Do not invent variants or phenotypes that are not listed.";

pub fn system_prompt(mode: ExplanationMode) -> &'static str {
    match mode {
        ExplanationMode::Expert => EXPERT_SYSTEM,
        ExplanationMode::Patient => PATIENT_SYSTEM,
    }
}

/// User prompt carrying the structured result
pub fn user_prompt(ctx: &ClinicalContext) -> String {
    let length = match ctx.mode {
        ExplanationMode::Expert => "3-4 sentences",
        ExplanationMode::Patient => "2-3 short sentences",
    };

    format!(
        "Drug: {}\nGene: {}\nPhenotype: {}\nDetected variant: {}\nRisk level: {}\n\
         Clinical recommendation: {}\n\n\
         Explain in {} why this genetic result leads to the stated risk and recommendation.",
        ctx.drug, ctx.gene, ctx.phenotype, ctx.variant, ctx.risk_level, ctx.recommendation, length
    )
}

/// System and user prompt joined, for single-prompt backends
pub fn build_prompt(ctx: &ClinicalContext) -> String {
    format!("{}\n\n{}", system_prompt(ctx.mode), user_prompt(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(mode: ExplanationMode) -> ClinicalContext {
        ClinicalContext {
            drug: "CODEINE".to_string(),
            gene: "CYP2D6".to_string(),
            phenotype: "Poor Metabolizer".to_string(),
            variant: "*4".to_string(),
            risk_level: "HIGH".to_string(),
            recommendation: "Avoid codeine.".to_string(),
            mode,
        }
    }

    #[test]
    fn test_prompt_contains_context() {
        let prompt = build_prompt(&context(ExplanationMode::Patient));
        for needle in ["CODEINE", "CYP2D6", "Poor Metabolizer", "*4", "HIGH", "Avoid codeine."] {
            assert!(prompt.contains(needle), "missing {}", needle);
        }
    }

    #[test]
    fn test_mode_selects_style() {
        let expert = build_prompt(&context(ExplanationMode::Expert));
        let patient = build_prompt(&context(ExplanationMode::Patient));
        assert!(expert.contains("technical"));
        assert!(patient.contains("plain"));
        assert_ne!(expert, patient);
    }
}
