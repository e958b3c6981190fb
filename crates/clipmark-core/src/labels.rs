// crates/clipmark-core/src/labels.rs
//
// Label set algebra: pure functions over sorted, duplicate-free label lists.
//
// Every function returns a fresh, normalized Vec so callers never have to
// think about ordering. Ordering is for stable serialization and display only.

use std::collections::BTreeSet;

/// Sort and de-duplicate.
pub fn normalize(mut labels: Vec<String>) -> Vec<String> {
    labels.sort();
    labels.dedup();
    labels
}

/// Insert `new` unless already present.
///
/// ```
/// use clipmark_core::labels::add;
/// let l = vec!["cat".to_string(), "dog".to_string()];
/// assert_eq!(add(&l, "bird"), ["bird", "cat", "dog"]);
/// ```
pub fn add(labels: &[String], new: &str) -> Vec<String> {
    if labels.iter().any(|l| l == new) {
        return labels.to_vec();
    }
    let mut out = labels.to_vec();
    out.push(new.to_string());
    normalize(out)
}

/// Drop `target`. Absent labels are a no-op.
pub fn remove(labels: &[String], target: &str) -> Vec<String> {
    normalize(labels.iter().filter(|l| *l != target).cloned().collect())
}

/// Replace `old` with `new`. When `new` is already present the two merge
/// into one entry.
pub fn rename(labels: &[String], old: &str, new: &str) -> Vec<String> {
    if !labels.iter().any(|l| l == old) {
        return labels.to_vec();
    }
    normalize(
        labels.iter()
            .map(|l| if l == old { new.to_string() } else { l.clone() })
            .collect(),
    )
}

/// Sorted union of every label set. Drives the suggestion buttons.
pub fn unique<'a, I, S>(sets: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<[String]> + 'a + ?Sized,
{
    sets.into_iter()
        .flat_map(|s| s.as_ref().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Labels starting with `text`, case-insensitively. Empty `text` keeps all.
pub fn filter_prefix<'a>(labels: &'a [String], text: &str) -> Vec<&'a str> {
    let needle = text.to_lowercase();
    labels.iter()
        .filter(|l| l.to_lowercase().starts_with(&needle))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn is_strictly_sorted(l: &[String]) -> bool {
        l.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn add_inserts_sorted() {
        assert_eq!(add(&set(&["cat", "dog"]), "bird"), set(&["bird", "cat", "dog"]));
    }

    #[test]
    fn add_is_idempotent() {
        let l = set(&["cat"]);
        let once = add(&l, "x");
        assert_eq!(add(&once, "x"), once);
        assert_eq!(add(&l, "cat"), l);
    }

    #[test]
    fn add_empty_string_is_allowed() {
        assert_eq!(add(&set(&["a"]), ""), set(&["", "a"]));
    }

    #[test]
    fn remove_is_idempotent_and_tolerates_absent() {
        let l = set(&["a", "b", "c"]);
        let once = remove(&l, "b");
        assert_eq!(once, set(&["a", "c"]));
        assert_eq!(remove(&once, "b"), once);
        assert_eq!(remove(&l, "zzz"), l);
    }

    #[test]
    fn rename_resorts() {
        assert_eq!(rename(&set(&["a", "m"]), "a", "z"), set(&["m", "z"]));
    }

    #[test]
    fn rename_absent_is_noop() {
        let l = set(&["a", "b"]);
        assert_eq!(rename(&l, "q", "z"), l);
    }

    #[test]
    fn rename_collision_merges() {
        let out = rename(&set(&["cat", "kitty"]), "kitty", "cat");
        assert_eq!(out, set(&["cat"]));
        assert!(is_strictly_sorted(&out));
    }

    #[test]
    fn unique_unions_all_sets() {
        let sets = vec![set(&["b", "a"]), set(&[]), set(&["c", "a"])];
        assert_eq!(unique(&sets), set(&["a", "b", "c"]));
    }

    #[test]
    fn filter_prefix_is_case_insensitive() {
        let l = set(&["Cat", "car", "dog"]);
        assert_eq!(filter_prefix(&l, "CA"), ["Cat", "car"]);
        assert_eq!(filter_prefix(&l, "").len(), 3);
    }

    #[test]
    fn every_op_preserves_sort_invariant() {
        let mut l = Vec::new();
        for op in ["m", "a", "z", "a", "q"] {
            l = add(&l, op);
            assert!(is_strictly_sorted(&l));
        }
        l = rename(&l, "z", "a");
        assert!(is_strictly_sorted(&l));
        l = remove(&l, "m");
        assert!(is_strictly_sorted(&l));
        assert_eq!(l, set(&["a", "q"]));
    }
}
