//! Maps two flat sets of relative paths onto their sorted union.

use std::collections::BTreeSet;

/// One entry of the union of set A and set B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePairing {
    pub relative_path: String,
    pub present_in_a: bool,
    pub present_in_b: bool,
}

impl FilePairing {
    /// Storage path on side A, equal to the relative path when present.
    pub fn set_a_path(&self) -> Option<&str> {
        self.present_in_a.then_some(self.relative_path.as_str())
    }

    pub fn set_b_path(&self) -> Option<&str> {
        self.present_in_b.then_some(self.relative_path.as_str())
    }

    pub fn is_missing(&self) -> bool {
        !(self.present_in_a && self.present_in_b)
    }
}

/// Pairs two path sets. Output is ordered lexicographically and contains
/// each path once; duplicates in either input collapse.
pub fn pair_paths<A, B>(set_a: A, set_b: B) -> Vec<FilePairing>
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    let a: BTreeSet<String> = set_a.into_iter().map(|p| p.as_ref().to_string()).collect();
    let b: BTreeSet<String> = set_b.into_iter().map(|p| p.as_ref().to_string()).collect();

    a.union(&b)
        .map(|path| FilePairing {
            relative_path: path.clone(),
            present_in_a: a.contains(path),
            present_in_b: b.contains(path),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_with_presence_flags() {
        let pairs = pair_paths(["x", "y"], ["y", "z"]);

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].relative_path, "x");
        assert!(pairs[0].present_in_a && !pairs[0].present_in_b);
        assert_eq!(pairs[1].relative_path, "y");
        assert!(pairs[1].present_in_a && pairs[1].present_in_b);
        assert!(!pairs[1].is_missing());
        assert_eq!(pairs[2].relative_path, "z");
        assert!(!pairs[2].present_in_a && pairs[2].present_in_b);
    }

    #[test]
    fn test_empty_inputs() {
        let empty: [&str; 0] = [];
        assert!(pair_paths(empty, empty).is_empty());
    }

    #[test]
    fn test_storage_paths_follow_presence() {
        let pairs = pair_paths(["docs/a.pdf"], Vec::<String>::new());
        assert_eq!(pairs[0].set_a_path(), Some("docs/a.pdf"));
        assert_eq!(pairs[0].set_b_path(), None);
    }

    #[test]
    fn test_lexicographic_order_and_dedup() {
        let pairs = pair_paths(["b", "a", "b"], vec!["c".to_string(), "a".to_string()]);
        let paths: Vec<_> = pairs.iter().map(|p| p.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c"]);
    }
}
