//! Factorio dependency strings
//!
//! A dependency entry in `info.json` looks like `"? some-mod >= 1.2.0"`:
//! an optional prefix, the mod name, and an optional version constraint.
//!
//! | Prefix | Meaning |
//! |--------|---------|
//! | (none) | required |
//! | `?`    | optional |
//! | `(?)`  | hidden optional |
//! | `!`, `(!)` | incompatible |
//! | `~`    | required, does not affect load order |
//!
//! Parsing never fails: malformed input yields an empty name and no constraint.

mod validator;
mod version;

pub use validator::*;
pub use version::*;

/// Dependencies provided by the game itself
pub const GAME_DEPENDENCIES: [&str; 4] = ["base", "space-age", "quality", "elevated-rails"];

/// Built-in dependencies that ship with the Space Age expansion
pub const DLC_DEPENDENCIES: [&str; 3] = ["space-age", "quality", "elevated-rails"];

/// Characters that terminate a dependency name
const NAME_SEPARATORS: [char; 7] = ['>', '<', '=', '!', '?', '(', ')'];

/// Characters that make up a version operator
const OPERATOR_CHARS: [char; 4] = ['>', '<', '=', '!'];

/// How a dependency relates to the mod declaring it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Required,
    Optional,
    HiddenOptional,
    Conflict,
    NoLoadOrder,
}

impl DependencyKind {
    /// Classify a raw dependency string by its prefix
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("(?)") {
            DependencyKind::HiddenOptional
        } else if is_optional_dependency(trimmed) {
            DependencyKind::Optional
        } else if is_conflict_dependency(trimmed) {
            DependencyKind::Conflict
        } else if trimmed.starts_with('~') {
            DependencyKind::NoLoadOrder
        } else {
            DependencyKind::Required
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, DependencyKind::Required | DependencyKind::NoLoadOrder)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, DependencyKind::Optional | DependencyKind::HiddenOptional)
    }
}

/// A parsed dependency entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
    pub constraint: Option<VersionConstraint>,
}

/// Remove a leading modifier (`(?)`, `(!)`, `?`, `!`, `~`) and surrounding whitespace
pub fn strip_modifier(raw: &str) -> &str {
    let trimmed = raw.trim();
    let rest = ["(?)", "(!)", "?", "!", "~"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(*prefix))
        .unwrap_or(trimmed);
    rest.trim()
}

/// Extract the mod name from a dependency string.
///
/// The name is everything before the first separator character, so names
/// containing spaces survive (`"(?)complex mod name>=1.0"` gives
/// `"complex mod name"`).
pub fn extract_dependency_name(raw: &str) -> String {
    strip_modifier(raw)
        .split(NAME_SEPARATORS)
        .map(str::trim)
        .find(|token| !token.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Parse a dependency string into name, kind and optional version constraint
pub fn parse_dependency(raw: &str) -> Dependency {
    let name = extract_dependency_name(raw);
    let kind = DependencyKind::from_raw(raw);
    let constraint = parse_constraint(strip_modifier(raw));

    Dependency {
        name,
        kind,
        constraint,
    }
}

/// Read the `<op> <version>` tail of a stripped dependency string
fn parse_constraint(stripped: &str) -> Option<VersionConstraint> {
    let start = stripped.find(OPERATOR_CHARS)?;
    let rest = &stripped[start..];

    let op_len = rest
        .char_indices()
        .find(|(_, c)| !OPERATOR_CHARS.contains(c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());

    let op = VersionOp::from_symbol(&rest[..op_len])?;
    let version = rest[op_len..].split_whitespace().next()?;

    Some(VersionConstraint {
        op,
        version: version.to_string(),
    })
}

/// True if the dependency is optional (`?` prefix or `(?)` marker)
pub fn is_optional_dependency(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with('?') || trimmed.contains("(?)")
}

/// True if the dependency marks an incompatible mod (`!` prefix or `(!)` marker)
pub fn is_conflict_dependency(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with('!') || trimmed.contains("(!)")
}

/// True if `name` is provided by the game (`base` or an expansion mod)
pub fn is_game_dependency(name: &str) -> bool {
    let name = name.trim();
    GAME_DEPENDENCIES
        .iter()
        .any(|game| game.eq_ignore_ascii_case(name))
}

/// True if `name` is one of the expansion's built-in mods
pub fn is_dlc_dependency(name: &str) -> bool {
    let name = name.trim();
    DLC_DEPENDENCIES.iter().any(|dlc| dlc.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(op: VersionOp, version: &str) -> VersionConstraint {
        VersionConstraint {
            op,
            version: version.to_string(),
        }
    }

    #[test]
    fn test_extract_name_with_prefixes() {
        assert_eq!(extract_dependency_name("? base >= 1.0"), "base");
        assert_eq!(extract_dependency_name("(?)complex mod name>=1.0"), "complex mod name");
        assert_eq!(extract_dependency_name("! bad-mod"), "bad-mod");
        assert_eq!(extract_dependency_name("(!) bad-mod < 2.0"), "bad-mod");
        assert_eq!(extract_dependency_name("~ flib >= 0.12.0"), "flib");
        assert_eq!(extract_dependency_name("some-mod"), "some-mod");
    }

    #[test]
    fn test_extract_name_empty_input() {
        assert_eq!(extract_dependency_name(""), "");
        assert_eq!(extract_dependency_name("   "), "");
    }

    #[test]
    fn test_parse_with_constraint() {
        let dep = parse_dependency("base >= 1.1");
        assert_eq!(dep.name, "base");
        assert_eq!(dep.constraint, Some(constraint(VersionOp::GreaterOrEqual, "1.1")));
        assert_eq!(dep.kind, DependencyKind::Required);
    }

    #[test]
    fn test_parse_bare_name() {
        let dep = parse_dependency("some-mod");
        assert_eq!(dep.name, "some-mod");
        assert_eq!(dep.constraint, None);
    }

    #[test]
    fn test_parse_operator_without_version() {
        let dep = parse_dependency("some-mod >=");
        assert_eq!(dep.name, "some-mod");
        assert!(dep.constraint.is_none());
    }

    #[test]
    fn test_parse_all_operators() {
        let cases = [
            ("a = 1.0.0", VersionOp::Equal),
            ("a >= 1.0.0", VersionOp::GreaterOrEqual),
            ("a <= 1.0.0", VersionOp::LessOrEqual),
            ("a > 1.0.0", VersionOp::Greater),
            ("a < 1.0.0", VersionOp::Less),
            ("a != 1.0.0", VersionOp::NotEqual),
            ("a>1.0.0", VersionOp::Greater),
        ];
        for (raw, op) in cases {
            let dep = parse_dependency(raw);
            assert_eq!(dep.name, "a", "{}", raw);
            assert_eq!(dep.constraint, Some(constraint(op, "1.0.0")), "{}", raw);
        }
    }

    #[test]
    fn test_parse_prefixed_constraint() {
        let dep = parse_dependency("(?) complex mod name >= 1.2.3");
        assert_eq!(dep.name, "complex mod name");
        assert_eq!(dep.kind, DependencyKind::HiddenOptional);
        assert_eq!(dep.constraint, Some(constraint(VersionOp::GreaterOrEqual, "1.2.3")));

        let dep = parse_dependency("! evil-mod");
        assert_eq!(dep.kind, DependencyKind::Conflict);
        assert!(dep.constraint.is_none());
    }

    #[test]
    fn test_optional_and_conflict_flags() {
        assert!(is_optional_dependency("? foo"));
        assert!(is_optional_dependency("  (?) foo"));
        assert!(!is_optional_dependency("foo"));
        assert!(is_conflict_dependency("! foo"));
        assert!(is_conflict_dependency("(!) foo"));
        assert!(!is_conflict_dependency("foo != 1.0"));
        assert!(!is_conflict_dependency("~ foo"));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(DependencyKind::from_raw("~ flib"), DependencyKind::NoLoadOrder);
        assert!(DependencyKind::from_raw("~ flib").is_mandatory());
        assert!(DependencyKind::from_raw("? flib").is_optional());
        assert!(!DependencyKind::from_raw("! flib").is_mandatory());
    }

    #[test]
    fn test_game_dependencies() {
        assert!(is_game_dependency("base"));
        assert!(is_game_dependency("Space-Age"));
        assert!(is_game_dependency("quality"));
        assert!(is_game_dependency("elevated-rails"));
        assert!(!is_game_dependency("flib"));
        assert!(!is_dlc_dependency("base"));
        assert!(is_dlc_dependency("QUALITY"));
    }
}
