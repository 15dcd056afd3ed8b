// ABOUTME: Resource ceilings and attribute deny-lists for a sandboxed interpreter run

/// Attribute name prefixes that are always inaccessible, regardless of what
/// the host's builtins expose.
pub const DEFAULT_DISALLOW_PREFIXES: &[&str] = &["_", "func_"];

/// Exact method names that are always inaccessible even on values that
/// otherwise allow attribute reads.
pub const DEFAULT_DISALLOW_METHODS: &[&str] =
    &["format", "format_map", "mro", "__getframe__", "exec"];

/// Ceilings and deny-lists for one interpreter instance.
///
/// A `Config` is immutable for the lifetime of the [`crate::Interpreter`]
/// that owns it; every bounded operation in the value model and evaluator
/// consults it before growing a container or performing arithmetic.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum `approx_len` any container or string may reach.
    pub max_const_len: usize,
    /// Maximum total loop iterations (`for`, `while`, comprehensions,
    /// starred unpacking) per top-level run.
    pub max_loops: u64,
    /// Maximum syntax-tree node evaluations per top-level run.
    pub max_statements: u64,
    /// `a ** b` is refused if `|a|` exceeds this.
    pub max_power_base: i64,
    /// `a ** b` is refused if `|b|` exceeds this.
    pub max_power: i64,
    /// Integer magnitude limit is `[-2^(n-1), 2^(n-1)-1]`.
    pub max_int_size: u32,
    /// Maximum user-call nesting depth.
    pub max_recursion_depth: u32,
    /// Attribute names beginning with any of these are inaccessible.
    pub disallow_prefixes: Vec<String>,
    /// Attribute names exactly matching one of these are inaccessible.
    pub disallow_methods: Vec<String>,
    /// If `false`, builtins supplied to [`crate::Interpreter::new`] replace
    /// the default names entirely; if `true` (the default) they merge,
    /// with the caller's bindings taking precedence on conflicts.
    pub builtins_extend_default: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_const_len: 200_000,
            max_loops: 10_000,
            max_statements: 100_000,
            max_power_base: 1_000_000,
            max_power: 1_000,
            max_int_size: 64,
            max_recursion_depth: 50,
            disallow_prefixes: DEFAULT_DISALLOW_PREFIXES.iter().map(|s| s.to_string()).collect(),
            disallow_methods: DEFAULT_DISALLOW_METHODS.iter().map(|s| s.to_string()).collect(),
            builtins_extend_default: true,
        }
    }
}

impl Config {
    /// The inclusive bounds `[min_int, max_int]` implied by `max_int_size`.
    pub fn int_bounds(&self) -> (i64, i64) {
        if self.max_int_size >= 64 {
            return (i64::MIN, i64::MAX);
        }
        let max = (1i64 << (self.max_int_size - 1)) - 1;
        (-max - 1, max)
    }

    pub fn is_disallowed_attr(&self, name: &str) -> bool {
        self.disallow_prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.disallow_methods.iter().any(|m| m == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_ceilings() {
        let c = Config::default();
        assert_eq!(c.max_const_len, 200_000);
        assert_eq!(c.max_loops, 10_000);
        assert_eq!(c.max_recursion_depth, 50);
        assert_eq!(c.disallow_prefixes, vec!["_", "func_"]);
    }

    #[test]
    fn int_bounds_64_is_full_range() {
        let c = Config::default();
        assert_eq!(c.int_bounds(), (i64::MIN, i64::MAX));
    }

    #[test]
    fn int_bounds_narrow_width() {
        let mut c = Config::default();
        c.max_int_size = 8;
        assert_eq!(c.int_bounds(), (-128, 127));
    }

    #[test]
    fn disallowed_attr_checks_prefix_and_exact_match() {
        let c = Config::default();
        assert!(c.is_disallowed_attr("_secret"));
        assert!(c.is_disallowed_attr("func_helper"));
        assert!(c.is_disallowed_attr("format"));
        assert!(!c.is_disallowed_attr("value"));
    }
}
