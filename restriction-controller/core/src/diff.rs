use crate::Subject;
use ahash::AHashSet as HashSet;

/// Returns the subjects in `new` that have no equal counterpart in `old`.
///
/// Duplicates collapse to their first occurrence and the result follows the
/// order of `new`, so decisions name offending subjects deterministically.
pub fn new_subjects(old: &[Subject], new: &[Subject]) -> Vec<Subject> {
    let mut seen = old.iter().collect::<HashSet<_>>();
    new.iter()
        .filter(|s| seen.insert(*s))
        .cloned()
        .collect()
}
