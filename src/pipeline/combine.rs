use std::collections::HashMap;

use tracing::info;

use crate::domain::{CombinedUpdate, RawUpdate, Regulator};
use crate::error::{PipelineError, Result};

/// Union N regulator streams into one tagged stream. Order within each
/// regulator's stream is preserved; streams are concatenated in the order
/// given. A reference number appearing twice has ambiguous provenance and
/// aborts the combine rather than silently merging.
pub fn combine(streams: Vec<(Regulator, Vec<RawUpdate>)>) -> Result<Vec<CombinedUpdate>> {
    let mut seen: HashMap<String, Regulator> = HashMap::new();
    let mut combined = Vec::new();

    for (regulator, updates) in streams {
        for update in updates {
            if let Some(first) = seen.get(&update.reference_number) {
                crate::observability::metrics::combine::duplicate_reference();
                return Err(PipelineError::DuplicateReference {
                    reference: update.reference_number,
                    first: *first,
                    second: regulator,
                });
            }
            seen.insert(update.reference_number.clone(), regulator);
            combined.push(CombinedUpdate { regulator, update });
        }
    }

    crate::observability::metrics::combine::updates_combined(combined.len() as u64);
    info!(count = combined.len(), "combined regulator streams");
    Ok(combined)
}
