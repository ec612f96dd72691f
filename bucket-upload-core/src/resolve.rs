//! Pattern resolution: one include glob minus any number of exclude globs.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::contract::GlobEvaluator;
use crate::error::GlobError;

/// Resolve the list of paths to upload.
///
/// Returns the include matches, in the evaluator's order, minus every path
/// matched by any exclude pattern. Exclusion compares raw path strings; no
/// normalization is applied, so `./a.txt` and `a.txt` are different paths.
///
/// Any evaluation failure aborts the whole resolution. An exclude pattern
/// that matches nothing, or an include that matches nothing, is not an error.
pub fn resolve<G>(glob: &G, include: &str, excludes: &[String]) -> Result<Vec<String>, GlobError>
where
    G: GlobEvaluator + ?Sized,
{
    let matches = glob.glob(include)?;
    debug!(pattern = include, matches = matches.len(), "Evaluated include pattern");
    if excludes.is_empty() {
        return Ok(matches);
    }

    let mut excluded: HashSet<String> = HashSet::new();
    for pattern in excludes {
        let hits = glob.glob(pattern)?;
        debug!(pattern = %pattern, matches = hits.len(), "Evaluated exclude pattern");
        excluded.extend(hits);
    }

    let before = matches.len();
    let included: Vec<String> = matches
        .into_iter()
        .filter(|path| !excluded.contains(path))
        .collect();
    info!(
        matched = before,
        excluded = before - included.len(),
        remaining = included.len(),
        "Applied exclude patterns"
    );
    Ok(included)
}
