//! VCF text parser restricted to the supported pharmacogenes.
//!
//! Malformed data lines are dropped, never reported: a file that is
//! entirely garbage parses to an empty list.

use crate::types::ParsedVariant;
use std::collections::HashMap;
use tracing::debug;

/// Genes the pipeline knows how to interpret
pub const TARGET_GENES: [&str; 6] = ["CYP2D6", "CYP2C19", "CYP2C9", "SLCO1B1", "TPMT", "DPYD"];

/// CHROM POS ID REF ALT QUAL FILTER INFO
const MIN_COLUMNS: usize = 8;

/// INFO value recorded for a bare flag
const FLAG_VALUE: &str = "true";

pub fn is_target_gene(gene: &str) -> bool {
    TARGET_GENES.contains(&gene)
}

/// Parse VCF text into variants on target genes, in source line order.
pub fn parse_vcf(content: &str) -> Vec<ParsedVariant> {
    let mut variants = Vec::new();
    let mut skipped = 0usize;

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_data_line(line) {
            Some(variant) => variants.push(variant),
            None => skipped += 1,
        }
    }

    debug!(
        "VCF parsed: {} target variants kept, {} lines dropped",
        variants.len(),
        skipped
    );
    variants
}

/// Parse one data line; `None` for short, incomplete or off-target lines.
/// Column values are kept verbatim.
fn parse_data_line(line: &str) -> Option<ParsedVariant> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MIN_COLUMNS {
        return None;
    }

    let chrom = columns[0];
    let pos = columns[1];
    let id = columns[2];
    let ref_allele = columns[3];
    let alt_allele = columns[4];
    let info_field = columns[7];

    if [chrom, pos, ref_allele, alt_allele, info_field]
        .iter()
        .any(|c| c.is_empty())
    {
        return None;
    }

    let info = parse_info(info_field);

    // Exact match only: "CYP2D6,CYP2C19" is not split
    let gene = info.get("GENE").filter(|g| is_target_gene(g))?.clone();
    let star_allele = info.get("STAR").cloned();

    let rs_id = if id == "." { String::new() } else { id.to_string() };

    Some(ParsedVariant {
        gene,
        rs_id,
        star_allele,
        chromosome: chrom.to_string(),
        position: pos.to_string(),
        ref_allele: ref_allele.to_string(),
        alt_allele: alt_allele.to_string(),
        info,
    })
}

/// Split an INFO column into key/value pairs.
pub fn parse_info(field: &str) -> HashMap<String, String> {
    field
        .split(';')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (segment.to_string(), FLAG_VALUE.to_string()),
        })
        .collect()
}
