//! # Contracts
//!
//! Shared data model for the pipeline driver: configuration references,
//! stage flags, run plans, resolved invocations and run reports.
//! All other crates depend on this one; reverse dependencies are prohibited.
//!
//! ## Run Model
//! - A plan is an ordered list of steps; a step either switches the active
//!   paramfile or runs one stage against it
//! - Resolving a plan yields one `StageInvocation` per stage step
//! - Running the invocations yields one `StageOutcome` each, in order

mod error;
mod flag;
mod invocation;
mod outcome;
mod plan;
mod stage_name;

pub use error::*;
pub use flag::{flag_args, FlagSet, StageFlag};
pub use invocation::StageInvocation;
pub use outcome::*;
pub use plan::*;
pub use stage_name::{StageName, KNOWN_STAGES};
