//! Key prefixing for the Redis adapter.
//!
//! Lock keys are flat strings, not the namespace/tenant/kind composites some
//! other backends render; prefixing is a plain string join.

/// Apply the configured prefix to a caller-supplied lock key.
pub fn apply_prefix(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

/// Strip the configured prefix back off a rendered key, for surfacing the
/// caller's own key in diagnostics (e.g. a batch failure's `failed_key`).
pub fn strip_prefix(prefix: &str, rendered: &str) -> String {
    if prefix.is_empty() {
        return rendered.to_string();
    }
    let pat = format!("{prefix}:");
    rendered.strip_prefix(pat.as_str()).unwrap_or(rendered).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_and_strips_prefix() {
        let rendered = apply_prefix("redlock", "my-resource");
        assert_eq!(rendered, "redlock:my-resource");
        assert_eq!(strip_prefix("redlock", &rendered), "my-resource");
    }

    #[test]
    fn empty_prefix_is_identity() {
        assert_eq!(apply_prefix("", "k"), "k");
        assert_eq!(strip_prefix("", "k"), "k");
    }

    #[test]
    fn strip_is_noop_on_unprefixed_input() {
        assert_eq!(strip_prefix("redlock", "unrelated"), "unrelated");
    }
}
