//! Stage mode flags
//!
//! Independent boolean switches passed to a stage on its command line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A mode switch selecting which sub-behaviour a stage performs.
///
/// Variant order is the order flags are rendered on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFlag {
    /// Process simulations
    Sims,
    /// Process the transfer-function simulations
    Transfer,
    /// Process real data
    Data,
    /// Estimate the transfer function
    TfEst,
    /// Produce plots
    Plots,
}

impl StageFlag {
    /// All flags, in rendering order
    pub const ALL: [StageFlag; 5] = [
        StageFlag::Sims,
        StageFlag::Transfer,
        StageFlag::Data,
        StageFlag::TfEst,
        StageFlag::Plots,
    ];

    /// Command-line argument for this flag
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Sims => "--sims",
            Self::Transfer => "--transfer",
            Self::Data => "--data",
            Self::TfEst => "--tf_est",
            Self::Plots => "--plots",
        }
    }

    /// Parse the plan-file spelling (`sims`, `tf_est`, ...) or the argument
    /// spelling (`--sims`, `--tf_est`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.strip_prefix("--").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_arg().trim_start_matches("--") == name)
    }
}

impl fmt::Display for StageFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Set of flags for one invocation; each flag at most once
pub type FlagSet = BTreeSet<StageFlag>;

/// Render a flag set as command-line arguments
pub fn flag_args(flags: &FlagSet) -> Vec<&'static str> {
    flags.iter().map(|f| f.as_arg()).collect()
}
