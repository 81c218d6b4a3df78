use std::fmt::{Display, Formatter};

use crate::misc::cancellation::CancellationToken;

pub mod column_pool;
pub mod driver;
pub mod dual_values;
pub mod master;
pub mod pricer;
pub mod schedule;
pub mod sub_problem;

/// Factory used for LPModels
pub trait LPEnv: Sized {
    fn new_with_seed(seed: i32) -> Self;
    fn set_time_limit(&mut self, seconds: f64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarType {
    Continuous,
    Integer,
    Binary,
}

/// Outcome of a single `optimize` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    /// Feasible, stopped because the optimality gap was reached
    GapLimit,
    TimeLimit,
    Interrupted,
    Infeasible,
    Other,
}

impl SolveStatus {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SolveStatus::Interrupted)
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(self, SolveStatus::Infeasible)
    }

    /// Search was completed, so the reported dual bound is valid for the whole problem
    pub fn is_complete(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::GapLimit | SolveStatus::Infeasible)
    }
}

/// Trait for a linear (or mixed integer) programming model
/// Panics on errors
pub trait LPModel: Sized + Send {
    type Env: LPEnv;
    type Var: Clone + Send + Sync;
    type Constr: Clone + Send + Sync;

    // Use factory LPEnv to create new model
    fn new(name: &str, env: &mut Self::Env) -> Self;

    fn add_var(&mut self, name: &str, var_type: VarType, obj: f64, lb: f64, ub: f64) -> Self::Var;

    // Ranged row lhs <= terms <= rhs. lhs == rhs is an equality,
    // infinite sides make the row one sided.
    fn add_constr(&mut self, name: &str, terms: &[(Self::Var, f64)], lhs: f64, rhs: f64) -> Self::Constr;

    fn set_objective_coefficient(&mut self, var: &Self::Var, value: f64);

    fn set_time_limit(&mut self, seconds: f64);

    // Run optimization. Engines poll `cancel` where they can,
    // at the very least before starting.
    fn optimize(&mut self, cancel: &CancellationToken) -> SolveStatus;

    // Return objective of the best solution
    fn get_objective(&self) -> f64;

    // Return runtime of last optimization in seconds
    fn get_runtime(&self) -> f64;

    // Return solution coefficents for the list of variables
    fn get_x_list(&self, vars: &[Self::Var]) -> Vec<f64>;
}

/// Master side of the engine: accepts priced columns and exposes duals
pub trait PricedModel: LPModel {
    /// Adds a continuous, non-negative column. `reduced_cost` is the pricer's estimate.
    fn add_priced_column(&mut self, name: &str, obj: f64, reduced_cost: f64, coefficients: &[(Self::Constr, f64)]) -> Self::Var;

    // Return dual values for list of constraints
    fn get_dual_list(&self, constrs: &[Self::Constr]) -> Vec<f64>;

    // Return farkas multipliers after an infeasible solve
    fn get_farkas_list(&self, constrs: &[Self::Constr]) -> Vec<f64>;
}

/// Subproblem side of the engine: mixed integer solves with a solution pool
pub trait MipModel: LPModel {
    fn set_gap(&mut self, gap: f64);

    // Return number of solutions found
    fn get_num_solutions(&self) -> usize;

    // Solution coefficients of the k-th best solution (0 is the incumbent).
    // Mutable since engines select pool entries through a parameter.
    fn get_solution_x_list(&mut self, k: usize, vars: &[Self::Var]) -> Vec<f64>;

    fn get_solution_objective(&mut self, k: usize) -> f64;

    // Best proven lower bound of the last solve
    fn get_dual_bound(&self) -> f64;
}

/// Integer tolerance. Same as gurobi
pub const INT_FEAS_TOL: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PricingKind {
    /// Master LP optimal, look for columns with negative reduced cost
    ReducedCost,
    /// Master LP infeasible, look for columns violating the farkas certificate
    Farkas,
}

impl PricingKind {
    pub fn is_farkas(&self) -> bool {
        matches!(self, PricingKind::Farkas)
    }
}

impl Display for PricingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingKind::ReducedCost => write!(f, "redcost"),
            PricingKind::Farkas => write!(f, "farkas"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PricingResult {
    FoundColumns(Vec<column_pool::ColumnId>),
    NoColumns,
}

impl PricingResult {
    pub fn found(&self) -> bool {
        matches!(self, PricingResult::FoundColumns(_))
    }
}

/// Entry points invoked by the host's branch-and-bound loop
pub trait PricingCallbacks {
    fn on_reduced_cost_pricing_requested(&mut self) -> PricingResult;
    fn on_feasibility_pricing_requested(&mut self) -> PricingResult;
}

#[derive(Clone, Debug)]
/// Settings of the per line pricing loop
pub struct PricingSettings {
    /// Seed one artificial expensive column per line before the first pricing round
    pub generate_initial_trivial_column: bool,

    pub initial_solve_enabled: bool,
    pub initial_solve_gap: f64,
    pub initial_solve_time_limit: f64,
    /// Stop after the initial attempt, never enter the gap ladder
    pub only_initial_solve: bool,

    pub dynamic_gap: f64,
    pub dynamic_gap_max_rounds: usize,
    pub dynamic_gap_lower_bound: f64,
    pub dynamic_gap_time_limit: f64,

    pub fallback_exact_solve: bool,
    pub nominal_gap: f64,

    /// Interrupt the remaining lines once one line found a column (reduced cost rounds only)
    pub enable_subproblem_interruption: bool,

    pub reduced_cost_tolerance: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            generate_initial_trivial_column: false,
            initial_solve_enabled: false,
            initial_solve_gap: 0.0,
            initial_solve_time_limit: 1e20,
            only_initial_solve: false,
            dynamic_gap: 50.0,
            dynamic_gap_max_rounds: 20,
            dynamic_gap_lower_bound: 0.01,
            dynamic_gap_time_limit: 600.0,
            fallback_exact_solve: true,
            nominal_gap: 0.0,
            enable_subproblem_interruption: true,
            reduced_cost_tolerance: INT_FEAS_TOL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DriverSettings {
    pub master_time_limit: f64,
    /// Take the schedule of the heaviest lambda per line instead of walking the X values
    pub reconstruct_schedule_from_solution: bool,
    pub max_iterations: usize,
    pub time_limit: Option<std::time::Duration>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            master_time_limit: 1e20,
            reconstruct_schedule_from_solution: false,
            max_iterations: 10_000,
            time_limit: None,
        }
    }
}
