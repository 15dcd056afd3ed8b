// ABOUTME: Regexes gating printf-style and f-string format specifiers
//
// Grounded in examples/original_source/draconic/string.py's
// `PRINTF_TEMPLATE_RE` / `FORMAT_SPEC_RE` (both named but elided from the
// filtered corpus) and examples/parcadei-ouros's use of `regex`/`fancy-regex`
// for the equivalent CPython format-mini-language validation.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ExcKind, Postponed};

/// `%[(mapping_key)][flags][width][.precision][length]type`
pub fn printf_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"%(?:\((?P<mapping_key>[^)]*)\))?(?P<flags>[-+ 0#]*)(?P<width>\*|\d+)?(?:\.(?P<precision>\*|\d+))?(?P<length>[hlL])?(?P<type>[diouxXeEfFgGcrsa%])",
        )
        .expect("printf template regex is a fixed literal")
    })
}

/// `[[fill]align][sign][#][0][width][,_][.precision][type]`
pub fn format_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<fill>.)?(?P<align>[<>=^]))?(?P<sign>[-+ ])?(?P<alt>#)?(?P<zero>0)?(?P<width>\d+)?(?P<grouping>[_,])?(?:\.(?P<precision>\d+))?(?P<type>[bcdeEfFgGnosxX%])?$",
        )
        .expect("format spec regex is a fixed literal")
    })
}

/// Validates an `f"{x:spec}"` format spec and returns the worst-case
/// additional length it can contribute (width, or width+precision when both
/// are present), per spec.md §4.5.
pub fn validate_format_spec(spec: &str) -> Result<usize, Postponed> {
    let caps = format_spec_re()
        .captures(spec)
        .ok_or_else(|| Postponed(ExcKind::FeatureNotAvailable(format!("Invalid format spec: {spec}"))))?;
    let width: usize = caps.name("width").map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let precision: usize = caps.name("precision").map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    Ok(width + precision)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_spec_accepts_documented_fields() {
        assert!(validate_format_spec(">10.2f").is_ok());
        assert_eq!(validate_format_spec(">10.2f").unwrap(), 12);
        assert!(validate_format_spec("").is_ok());
    }

    #[test]
    fn format_spec_rejects_garbage() {
        assert!(validate_format_spec("not a spec!!").is_err());
    }

    #[test]
    fn printf_template_matches_star_width() {
        let re = printf_template_re();
        let caps = re.captures("%*d").unwrap();
        assert_eq!(caps.name("width").unwrap().as_str(), "*");
    }
}
