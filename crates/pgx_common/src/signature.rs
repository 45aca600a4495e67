//! Order-independent fingerprint of a variant set.

use crate::types::ParsedVariant;
use sha2::{Digest, Sha256};

/// Separator between identifiers; never appears in an rsID
const DELIMITER: &str = "|";

/// SHA-256 over the sorted, deduplicated, `|`-joined non-empty identifiers,
/// rendered as lowercase hex.
pub fn signature<S: AsRef<str>>(ids: &[S]) -> String {
    let mut kept: Vec<&str> = ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| !id.is_empty())
        .collect();
    kept.sort_unstable();
    kept.dedup();

    let mut hasher = Sha256::new();
    hasher.update(kept.join(DELIMITER).as_bytes());
    hex::encode(hasher.finalize())
}

/// Signature over the rsIDs of parsed variants
pub fn variant_signature(variants: &[ParsedVariant]) -> String {
    let ids: Vec<&str> = variants.iter().map(|v| v.rs_id.as_str()).collect();
    signature(&ids)
}
