//! Routine metadata: user-routine formals and builtin keyword tables.
//!
//! A declared builtin keyword is written the way the routine library spells
//! it, e.g. `"2048FOO"`, `"~4096QUIET"`, `"#PROMPT"`, `"BAR"`:
//!
//! - leading digits declare a *mode* keyword: matching it ORs (or AND-NOTs)
//!   that bit pattern into the shared mode value and consumes no slot;
//! - a leading `~` flips the polarity of a mode keyword to clear-on-match;
//! - a leading `#` marks a *preserve* keyword whose value is passed through
//!   unevaluated;
//! - anything else is an ordinary slot-consuming keyword.
//!
//! Combinations outside these four forms are rejected at parse time rather
//! than resolved silently.

use std::fmt;

use crate::{Name, NodeId, SymId};

/// One formal parameter of a user routine.
///
/// `sym` is the parameter's symbol-table row (a Transfer symbol owned by the
/// routine); the recursion guard snapshots and restores exactly these rows.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RoutineParam {
    pub name: Name,
    pub sym: SymId,
}

/// Compiled metadata of a user-defined routine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutineMeta {
    /// Formal parameters in declaration order.
    pub params: Vec<RoutineParam>,
    /// True when the last parameter collects surplus positional arguments.
    pub variadic: bool,
    /// Statement list of the body, in execution order.
    pub body: Vec<NodeId>,
}

/// Malformed keyword declaration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordDeclError {
    /// Nothing left after the markers, or nothing at all.
    EmptyName { decl: String },
    /// `~` requires mode bits to clear.
    ClearWithoutBits { decl: String },
    /// `#` cannot be combined with mode bits or `~`.
    PreserveWithMode { decl: String },
    /// The digit prefix does not fit in the mode value.
    BitsOverflow { decl: String },
}

impl fmt::Display for KeywordDeclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordDeclError::EmptyName { decl } => {
                write!(f, "keyword declaration has no name: {decl:?}")
            }
            KeywordDeclError::ClearWithoutBits { decl } => {
                write!(f, "keyword declaration {decl:?}: `~` requires mode bits")
            }
            KeywordDeclError::PreserveWithMode { decl } => {
                write!(
                    f,
                    "keyword declaration {decl:?}: `#` cannot carry mode bits"
                )
            }
            KeywordDeclError::BitsOverflow { decl } => {
                write!(f, "keyword declaration {decl:?}: mode bits overflow")
            }
        }
    }
}

impl std::error::Error for KeywordDeclError {}

/// One declared keyword of a builtin routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordSpec {
    /// Name as matched against user input (markers stripped).
    pub name: String,
    /// Bit pattern for a mode keyword; `None` for a slot-consuming keyword.
    pub mode_bits: Option<u64>,
    /// Clear (AND-NOT) the bits instead of setting them when matched.
    pub clear: bool,
    /// Pass the value through unevaluated.
    pub preserve: bool,
}

impl KeywordSpec {
    /// Parse a declared keyword string.
    pub fn parse(decl: &str) -> Result<KeywordSpec, KeywordDeclError> {
        let mut rest = decl;
        let mut clear = false;
        let mut preserve = false;

        if let Some(stripped) = rest.strip_prefix('#') {
            preserve = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('~') {
            clear = true;
            rest = stripped;
        }

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (digits, name) = rest.split_at(digits_end);

        let mode_bits = if digits.is_empty() {
            None
        } else {
            Some(digits.parse::<u64>().map_err(|_| {
                KeywordDeclError::BitsOverflow {
                    decl: decl.to_owned(),
                }
            })?)
        };

        if name.is_empty() {
            return Err(KeywordDeclError::EmptyName {
                decl: decl.to_owned(),
            });
        }
        if clear && mode_bits.is_none() {
            return Err(KeywordDeclError::ClearWithoutBits {
                decl: decl.to_owned(),
            });
        }
        if preserve && mode_bits.is_some() {
            return Err(KeywordDeclError::PreserveWithMode {
                decl: decl.to_owned(),
            });
        }

        Ok(KeywordSpec {
            name: name.to_owned(),
            mode_bits,
            clear,
            preserve,
        })
    }

    /// True when matching this keyword consumes a parameter slot.
    #[inline]
    pub fn consumes_slot(&self) -> bool {
        self.mode_bits.is_none()
    }
}

/// Declared interface of a builtin routine.
#[derive(Clone, Debug, Default)]
pub struct BuiltinSpec {
    pub name: String,
    /// Minimum number of positional arguments.
    pub min_args: usize,
    /// Maximum number of positional arguments.
    pub max_args: usize,
    /// Bind arguments unevaluated (the routine evaluates what it needs).
    pub suppress_eval: bool,
    /// Initial shared mode value before any mode keyword applies.
    pub default_mode: u64,
    /// Slot index where positional arguments start landing; keyword slots
    /// occupy `0..positional_offset`.
    pub positional_offset: usize,
    pub keywords: Vec<KeywordSpec>,
}

impl BuiltinSpec {
    /// Declare a builtin with positional arity and no keywords.
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        BuiltinSpec {
            name: name.into(),
            min_args,
            max_args,
            suppress_eval: false,
            default_mode: 0,
            positional_offset: 0,
            keywords: Vec::new(),
        }
    }

    /// Attach a keyword table given as declaration strings.
    ///
    /// The positional offset is set to the number of slot-consuming keywords,
    /// so keyword slots and positional slots never collide.
    pub fn with_keywords(mut self, decls: &[&str]) -> Result<Self, KeywordDeclError> {
        self.keywords = decls
            .iter()
            .map(|d| KeywordSpec::parse(d))
            .collect::<Result<Vec<_>, _>>()?;
        self.positional_offset = self.keywords.iter().filter(|k| k.consumes_slot()).count();
        Ok(self)
    }

    /// Set the default mode value.
    #[must_use]
    pub fn default_mode(mut self, mode: u64) -> Self {
        self.default_mode = mode;
        self
    }

    /// Mark the builtin as evaluation-suppressing.
    #[must_use]
    pub fn suppress_eval(mut self) -> Self {
        self.suppress_eval = true;
        self
    }

    /// Slot index of the `idx`-th declared keyword, or `None` for a mode
    /// keyword.
    pub fn slot_of(&self, idx: usize) -> Option<usize> {
        if !self.keywords.get(idx)?.consumes_slot() {
            return None;
        }
        Some(
            self.keywords[..idx]
                .iter()
                .filter(|k| k.consumes_slot())
                .count(),
        )
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    mod keyword_parse {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn plain_keyword() {
            let kw = KeywordSpec::parse("BAR").unwrap();
            assert_eq!(kw.name, "BAR");
            assert_eq!(kw.mode_bits, None);
            assert!(!kw.clear);
            assert!(!kw.preserve);
            assert!(kw.consumes_slot());
        }

        #[test]
        fn mode_keyword_with_bits() {
            let kw = KeywordSpec::parse("2048FOO").unwrap();
            assert_eq!(kw.name, "FOO");
            assert_eq!(kw.mode_bits, Some(2048));
            assert!(!kw.consumes_slot());
        }

        #[test]
        fn clear_mode_keyword() {
            let kw = KeywordSpec::parse("~16TRACE").unwrap();
            assert_eq!(kw.name, "TRACE");
            assert_eq!(kw.mode_bits, Some(16));
            assert!(kw.clear);
        }

        #[test]
        fn preserve_keyword() {
            let kw = KeywordSpec::parse("#PROMPT").unwrap();
            assert_eq!(kw.name, "PROMPT");
            assert!(kw.preserve);
            assert!(kw.consumes_slot());
        }

        #[test]
        fn empty_name_is_rejected() {
            assert!(matches!(
                KeywordSpec::parse("2048"),
                Err(KeywordDeclError::EmptyName { .. })
            ));
            assert!(matches!(
                KeywordSpec::parse(""),
                Err(KeywordDeclError::EmptyName { .. })
            ));
        }

        #[test]
        fn clear_without_bits_is_rejected() {
            assert!(matches!(
                KeywordSpec::parse("~FOO"),
                Err(KeywordDeclError::ClearWithoutBits { .. })
            ));
        }

        #[test]
        fn preserve_with_bits_is_rejected() {
            assert!(matches!(
                KeywordSpec::parse("#2048FOO"),
                Err(KeywordDeclError::PreserveWithMode { .. })
            ));
        }
    }

    mod builtin_spec {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn positional_offset_counts_slot_keywords_only() {
            let spec = BuiltinSpec::new("plot", 1, 3)
                .with_keywords(&["2048FOO", "BAR", "#FMT"])
                .unwrap();
            // FOO is mode-only; BAR and FMT consume slots.
            assert_eq!(spec.positional_offset, 2);
            assert_eq!(spec.slot_of(0), None);
            assert_eq!(spec.slot_of(1), Some(0));
            assert_eq!(spec.slot_of(2), Some(1));
        }
    }
}
