//! Static pharmacogenomic lookup tables.
//!
//! Three JSON documents make up a table set:
//! - `drug_gene_map.json`: drug -> gene
//! - `gene_variant_map.json`: gene -> (star allele or rsID -> phenotype)
//! - `phenotype_rules.json`: drug -> (phenotype -> rule)
//!
//! A default set ships inside the binary; a directory with the same three
//! files can replace it at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DRUG_GENE_FILE: &str = "drug_gene_map.json";
pub const GENE_VARIANT_FILE: &str = "gene_variant_map.json";
pub const PHENOTYPE_RULES_FILE: &str = "phenotype_rules.json";

const BUILTIN_DRUG_GENE: &str = include_str!("../data/drug_gene_map.json");
const BUILTIN_GENE_VARIANT: &str = include_str!("../data/gene_variant_map.json");
const BUILTIN_PHENOTYPE_RULES: &str = include_str!("../data/phenotype_rules.json");

/// Clinical guidance for one (drug, phenotype) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenotypeRule {
    pub risk_label: String,
    pub severity: String,
    pub recommendation: String,
}

/// Table loading errors
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory lookup tables, immutable once built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTables {
    drug_gene_map: HashMap<String, String>,
    gene_variant_map: HashMap<String, HashMap<String, String>>,
    phenotype_rules: HashMap<String, HashMap<String, PhenotypeRule>>,
}

impl LookupTables {
    /// Build tables from already-deserialized maps. Drug keys are uppercased.
    pub fn new(
        drug_gene_map: HashMap<String, String>,
        gene_variant_map: HashMap<String, HashMap<String, String>>,
        phenotype_rules: HashMap<String, HashMap<String, PhenotypeRule>>,
    ) -> Self {
        Self {
            drug_gene_map: drug_gene_map
                .into_iter()
                .map(|(drug, gene)| (drug.to_uppercase(), gene))
                .collect(),
            gene_variant_map,
            phenotype_rules: phenotype_rules
                .into_iter()
                .map(|(drug, rules)| (drug.to_uppercase(), rules))
                .collect(),
        }
    }

    /// Tables bundled with the crate
    pub fn builtin() -> Result<Self, TableError> {
        Self::from_json(
            BUILTIN_DRUG_GENE,
            BUILTIN_GENE_VARIANT,
            BUILTIN_PHENOTYPE_RULES,
        )
    }

    /// Load the three table files from a directory
    pub fn load_dir(dir: &Path) -> Result<Self, TableError> {
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(|source| TableError::Io { path, source })
        };

        let tables = Self::from_json(
            &read(DRUG_GENE_FILE)?,
            &read(GENE_VARIANT_FILE)?,
            &read(PHENOTYPE_RULES_FILE)?,
        )?;
        info!(
            "Loaded lookup tables from {}: {} drugs, {} genes",
            dir.display(),
            tables.drug_gene_map.len(),
            tables.gene_variant_map.len()
        );
        Ok(tables)
    }

    fn from_json(drug_gene: &str, gene_variant: &str, rules: &str) -> Result<Self, TableError> {
        Ok(Self::new(
            parse_json(DRUG_GENE_FILE, drug_gene)?,
            parse_json(GENE_VARIANT_FILE, gene_variant)?,
            parse_json(PHENOTYPE_RULES_FILE, rules)?,
        ))
    }

    /// Target gene for an already-uppercased drug name
    pub fn gene_for_drug(&self, drug: &str) -> Option<&str> {
        self.drug_gene_map.get(drug).map(String::as_str)
    }

    /// Variant identifier -> phenotype table for a gene
    pub fn variant_phenotypes(&self, gene: &str) -> Option<&HashMap<String, String>> {
        self.gene_variant_map.get(gene)
    }

    /// Phenotype -> rule table for an already-uppercased drug name
    pub fn rules_for_drug(&self, drug: &str) -> Option<&HashMap<String, PhenotypeRule>> {
        self.phenotype_rules.get(drug)
    }

    /// Mapped drugs, sorted
    pub fn drugs(&self) -> Vec<String> {
        let mut drugs: Vec<String> = self.drug_gene_map.keys().cloned().collect();
        drugs.sort();
        drugs
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(name: &str, content: &str) -> Result<T, TableError> {
    serde_json::from_str(content).map_err(|source| TableError::Parse {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::TARGET_GENES;

    #[test]
    fn test_builtin_tables_cover_target_genes() {
        let tables = LookupTables::builtin().unwrap();
        for gene in TARGET_GENES {
            assert!(
                tables.variant_phenotypes(gene).is_some(),
                "missing variant map for {}",
                gene
            );
        }
        assert_eq!(tables.drugs().len(), 6);
    }

    #[test]
    fn test_builtin_clopidogrel_poor_metabolizer() {
        let tables = LookupTables::builtin().unwrap();
        assert_eq!(tables.gene_for_drug("CLOPIDOGREL"), Some("CYP2C19"));
        assert_eq!(
            tables.variant_phenotypes("CYP2C19").unwrap().get("*2").map(String::as_str),
            Some("Poor Metabolizer")
        );
        let rule = &tables.rules_for_drug("CLOPIDOGREL").unwrap()["Poor Metabolizer"];
        assert_eq!(rule.risk_label, "HIGH");
    }

    #[test]
    fn test_builtin_rules_reference_known_phenotypes() {
        let tables = LookupTables::builtin().unwrap();
        for drug in tables.drugs() {
            let gene = tables.gene_for_drug(&drug).unwrap();
            let phenotypes: Vec<&String> = tables.variant_phenotypes(gene).unwrap().values().collect();
            for phenotype in tables.rules_for_drug(&drug).unwrap().keys() {
                assert!(
                    phenotypes.contains(&phenotype),
                    "{} rule for '{}' has no variant mapping to it",
                    drug,
                    phenotype
                );
            }
        }
    }

    #[test]
    fn test_drug_keys_uppercased() {
        let mut drugs = HashMap::new();
        drugs.insert("Warfarin".to_string(), "CYP2C9".to_string());
        let mut rules = HashMap::new();
        rules.insert("warfarin".to_string(), HashMap::new());

        let tables = LookupTables::new(drugs, HashMap::new(), rules);
        assert_eq!(tables.gene_for_drug("WARFARIN"), Some("CYP2C9"));
        assert!(tables.rules_for_drug("WARFARIN").is_some());
        assert!(tables.gene_for_drug("Warfarin").is_none());
    }

    #[test]
    fn test_load_dir_round_trips_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DRUG_GENE_FILE), BUILTIN_DRUG_GENE).unwrap();
        fs::write(dir.path().join(GENE_VARIANT_FILE), BUILTIN_GENE_VARIANT).unwrap();
        fs::write(dir.path().join(PHENOTYPE_RULES_FILE), BUILTIN_PHENOTYPE_RULES).unwrap();

        let loaded = LookupTables::load_dir(dir.path()).unwrap();
        assert_eq!(loaded, LookupTables::builtin().unwrap());
    }

    #[test]
    fn test_load_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LookupTables::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
        assert!(err.to_string().contains(DRUG_GENE_FILE));
    }

    #[test]
    fn test_load_dir_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DRUG_GENE_FILE), "{\"CODEINE\": ").unwrap();
        fs::write(dir.path().join(GENE_VARIANT_FILE), "{}").unwrap();
        fs::write(dir.path().join(PHENOTYPE_RULES_FILE), "{}").unwrap();

        let err = LookupTables::load_dir(dir.path()).unwrap_err();
        match err {
            TableError::Parse { name, .. } => assert_eq!(name, DRUG_GENE_FILE),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
