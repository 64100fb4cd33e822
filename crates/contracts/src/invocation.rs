//! StageInvocation - one resolved (stage, paramfile, flags) triple

use serde::{Deserialize, Serialize};

use crate::{flag_args, FlagSet, ParamFile, StageName};

/// A single stage launch, fully resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInvocation {
    /// Position in the run, starting at 0
    pub index: usize,
    pub stage: StageName,
    pub paramfile: ParamFile,
    pub flags: FlagSet,
}

impl StageInvocation {
    pub fn new(index: usize, stage: StageName, paramfile: ParamFile, flags: FlagSet) -> Self {
        Self {
            index,
            stage,
            paramfile,
            flags,
        }
    }

    /// Flags as command-line arguments, in canonical order
    pub fn flag_args(&self) -> Vec<&'static str> {
        flag_args(&self.flags)
    }

    /// Stage arguments: `<config_arg> <paramfile> [flags...]`
    pub fn stage_args(&self, config_arg: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(2 + self.flags.len());
        args.push(config_arg.to_string());
        args.push(self.paramfile.to_string());
        args.extend(self.flag_args().into_iter().map(str::to_string));
        args
    }

    /// Short label used for log file names, e.g. `03_filterer`
    pub fn label(&self) -> String {
        format!("{:02}_{}", self.index, self.stage)
    }
}
