#![warn(warnings)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::needless_return)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]

pub mod misc;
pub mod instance;
pub mod column_generation;
pub mod compact;
mod ui;
pub mod solvers;

pub use ui::*;

pub use column_generation::column_pool::{Column, ColumnId, ColumnPool};
pub use column_generation::driver::{run_column_generation, ColGenResult};
pub use column_generation::dual_values::DualValues;
pub use column_generation::master::{MasterProblem, MasterSolveResult};
pub use column_generation::pricer::{trivial_schedules, LineOutcome, Pricer};
pub use column_generation::schedule::Schedule;
pub use column_generation::sub_problem::SubProblem;
pub use column_generation::{
    DriverSettings, LPEnv, LPModel, MipModel, PricedModel, PricingCallbacks, PricingKind, PricingResult, PricingSettings, SolveStatus,
    VarType, INT_FEAS_TOL,
};
pub use compact::{CompactModel, CompactSolution};
pub use instance::{Coil, EdgeKey, Instance, InstanceError, Mode, ProductionLine};
pub use misc::cancellation::{CancellationToken, ReportGuard, RoundSignal};
