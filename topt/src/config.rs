//! Verification options, with an optional `topt.toml` override file.
//!
//! ```toml
//! [verify]
//! check_each_var = true
//! single_typing = true
//! fail_on_unknown = false
//! smt_timeout_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options of one verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOpts {
    /// Also refine every named intermediate value with a same-named
    /// counterpart.
    #[serde(default)]
    pub check_each_var: bool,

    /// Stop after the first satisfying typing assignment.
    #[serde(default)]
    pub single_typing: bool,

    /// Promote an undecided solver answer to a verification failure.
    #[serde(default)]
    pub fail_on_unknown: bool,

    /// Per-query solver timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub smt_timeout_ms: u32,
}

const fn default_timeout_ms() -> u32 {
    10_000
}

impl Default for VerifyOpts {
    fn default() -> Self {
        Self {
            check_each_var: false,
            single_typing: false,
            fail_on_unknown: false,
            smt_timeout_ms: default_timeout_ms(),
        }
    }
}

impl VerifyOpts {
    /// Read options from a `topt.toml` file.
    ///
    /// Returns `None` if the file doesn't exist or has no `[verify]` table.
    #[must_use]
    pub fn from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML content with a `[verify]` table.
    #[must_use]
    pub fn from_toml_str(content: &str) -> Option<Self> {
        let doc: toml::Table = content.parse().ok()?;
        let verify = doc.get("verify")?.as_table()?;

        let get_bool = |key: &str| {
            verify
                .get(key)
                .and_then(toml::Value::as_bool)
                .unwrap_or(false)
        };

        let smt_timeout_ms = verify
            .get("smt_timeout_ms")
            .and_then(toml::Value::as_integer)
            .map_or(default_timeout_ms(), |v| {
                u32::try_from(v).unwrap_or_else(|_| default_timeout_ms())
            });

        Some(Self {
            check_each_var: get_bool("check_each_var"),
            single_typing: get_bool("single_typing"),
            fail_on_unknown: get_bool("fail_on_unknown"),
            smt_timeout_ms,
        })
    }
}

/// How transforms are echoed back to the user.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrintOpts {
    pub print_fn_header: bool,
}
