//! # Driver
//!
//! 流水线驱动模块。
//!
//! 负责：
//! - 按顺序启动 stage 子进程，每次 `<stage> --globals <paramfile> [flags]`
//! - 失败策略：fail-fast（默认）或 continue-on-failure
//! - 超时与取消，所有退出路径都会回收子进程
//! - 产出每个 stage 的 `StageOutcome` 与汇总 `RunReport`
//!
//! ## 使用示例
//!
//! ```ignore
//! use driver::{DriverOptions, PipelineDriver, ProcessLauncher};
//!
//! let plan = config_loader::PlanLoader::load_from_path(path)?;
//! let driver = PipelineDriver::new(
//!     ProcessLauncher::from_plan(&plan),
//!     DriverOptions::from_plan(&plan),
//! );
//! let report = driver.run_plan(&plan).await?;
//! ```

mod cancel;
mod driver;
mod error;
mod launcher;
mod mock_launcher;
mod process_launcher;

pub use cancel::{CancelHandle, CancelToken};
pub use driver::{DriverOptions, PipelineDriver};
pub use error::{DriverError, Result};
pub use launcher::{LocalStageLauncher, StageExit, StageLauncher};
pub use mock_launcher::{MockLauncherConfig, RecordingLauncher};
pub use process_launcher::ProcessLauncher;

// Re-export contracts types
pub use contracts::{FailurePolicy, RunReport, RunState, StageInvocation, StageOutcome, StageStatus};
