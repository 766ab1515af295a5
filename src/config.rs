//! Dialect options threaded explicitly into every stage.
//!
//! The defaults describe the production language.  Hosts that need the
//! book‑compatible or the "loose" dialect build a [`Config`] themselves (or
//! load one from JSON) and pass it at construction time; no stage reads
//! ambient state.

use serde::{Deserialize, Serialize};

/// Which values count as false in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truthiness {
    /// Only `nil` and `false` are falsy.
    #[default]
    Strict,

    /// Additionally `0` and `""` are falsy.
    Loose,
}

/// What `+` accepts when its operands are not both numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concat {
    /// If either operand is a string both are stringified and joined.
    #[default]
    Coerce,

    /// Both operands must be strings.
    StringsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub truthiness: Truthiness,
    pub concat: Concat,

    /// Recognise `+=`, `-=`, `++` and `--`.
    pub compound_operators: bool,

    /// Expand `\n` and `\t` inside string literals.
    pub escape_sequences: bool,

    /// Warn about locals that are defined but never read.
    pub warn_unused: bool,

    /// Deepest chain of nested calls before "Stack overflow.".
    pub max_call_depth: usize,
}

/// Default limit on nested calls.  Each level costs a few kilobytes of native
/// stack in release builds and tens of kilobytes in debug builds.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

impl Default for Config {
    fn default() -> Self {
        Config {
            truthiness: Truthiness::Strict,
            concat: Concat::Coerce,
            compound_operators: true,
            escape_sequences: true,
            warn_unused: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    /// The classic Lox dialect: no compound operators, no escapes, strings
    /// only concatenate with strings and no unused‑variable warnings.
    pub fn classic() -> Self {
        Config {
            truthiness: Truthiness::Strict,
            concat: Concat::StringsOnly,
            compound_operators: false,
            escape_sequences: false,
            warn_unused: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Production dialect with C‑like truthiness for numbers and strings.
    pub fn loose() -> Self {
        Config {
            truthiness: Truthiness::Loose,
            ..Config::default()
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
