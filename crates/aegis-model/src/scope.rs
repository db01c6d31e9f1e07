//! Scope set helpers.
//!
//! Scopes are matched exactly; there is no hierarchical or wildcard
//! interpretation.

/// Checks whether every scope in `requested` appears in `granted`.
#[must_use]
pub fn is_subset(requested: &[String], granted: &[String]) -> bool {
    requested.iter().all(|s| granted.iter().any(|g| g == s))
}

/// Returns the union of the given scope lists, preserving first-seen order.
#[must_use]
pub fn union<'a, I>(sets: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut out: Vec<String> = Vec::new();
    for set in sets {
        for scope in set {
            if !out.iter().any(|s| s == scope) {
                out.push(scope.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(s: &[&str]) -> Vec<String> {
        s.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn subset_holds_for_empty_request() {
        assert!(is_subset(&[], &scopes(&["a"])));
    }

    #[test]
    fn subset_is_exact() {
        assert!(is_subset(&scopes(&["a"]), &scopes(&["a", "b"])));
        assert!(!is_subset(&scopes(&["a", "c"]), &scopes(&["a", "b"])));
        assert!(!is_subset(&scopes(&["a.read"]), &scopes(&["a"])));
    }

    #[test]
    fn union_deduplicates() {
        let a = scopes(&["a", "b"]);
        let b = scopes(&["b", "c"]);
        assert_eq!(union([a.as_slice(), b.as_slice()]), scopes(&["a", "b", "c"]));
    }
}
