use std::time::Instant;

use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};

use crate::column_generation::{LPEnv, LPModel, MipModel, PricedModel, SolveStatus, VarType};
use crate::misc::cancellation::CancellationToken;

/// Pure rust engine.
///
/// microlp has no incremental interface and does not report duals, so the
/// models only record variables and rows and rebuild the problem on every
/// solve. Master duals and farkas rays come from a second LP over the dual
/// space, see `ModelData::dual`. Gaps and time limits are accepted but every
/// solve is exact.
pub struct MicroLpEnv {
    seed: i32,
    time_limit: f64,
}

impl MicroLpEnv {
    pub fn seed(&self) -> i32 {
        self.seed
    }
}

impl LPEnv for MicroLpEnv {
    fn new_with_seed(seed: i32) -> Self {
        MicroLpEnv { seed, time_limit: f64::INFINITY }
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.time_limit = seconds
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MicroLpVar(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MicroLpConstr(pub usize);

struct VarSpec {
    name: String,
    var_type: VarType,
    obj: f64,
    lb: f64,
    ub: f64,
}

struct RowSpec {
    name: String,
    terms: Vec<(usize, f64)>,
    lhs: f64,
    rhs: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum Sense {
    Eq,
    Ge,
    Le,
}

/// Row of the standardized problem `min c'x, x >= 0 or free`
struct StdRow {
    terms: Vec<(usize, f64)>,
    sense: Sense,
    rhs: f64,
    origin: Option<usize>,
}

const FEAS_TOL: f64 = 1e-9;
/// Relative slack on strong duality when recovering master duals
const DUAL_OBJ_TOL: f64 = 1e-7;

#[derive(Default)]
struct ModelData {
    name: String,
    vars: Vec<VarSpec>,
    rows: Vec<RowSpec>,
    time_limit: f64,
    gap: f64,
}

impl ModelData {
    fn add_var(&mut self, name: &str, var_type: VarType, obj: f64, lb: f64, ub: f64) -> usize {
        self.vars.push(VarSpec { name: name.to_string(), var_type, obj, lb, ub });
        self.vars.len() - 1
    }

    fn add_row(&mut self, name: &str, terms: Vec<(usize, f64)>, lhs: f64, rhs: f64) -> usize {
        self.rows.push(RowSpec { name: name.to_string(), terms, lhs, rhs });
        self.rows.len() - 1
    }

    /// Rows without any variable can only be checked, not handed to microlp
    fn empty_rows_feasible(&self) -> bool {
        self.rows
            .iter()
            .filter(|r| r.terms.is_empty())
            .all(|r| r.lhs <= FEAS_TOL && r.rhs >= -FEAS_TOL)
    }

    fn primal(&self, relax: bool) -> Result<(Vec<f64>, f64), microlp::Error> {
        if !self.empty_rows_feasible() {
            return Err(microlp::Error::Infeasible);
        }

        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<Variable> = self
            .vars
            .iter()
            .map(|v| match (relax, v.var_type) {
                (false, VarType::Binary) | (false, VarType::Integer) => {
                    problem.add_integer_var(v.obj, (to_int_bound(v.lb.ceil()), to_int_bound(v.ub.floor())))
                }
                _ => problem.add_var(v.obj, (v.lb, v.ub)),
            })
            .collect();

        for row in self.rows.iter().filter(|r| !r.terms.is_empty()) {
            let expr: LinearExpr = row.terms.iter().map(|(i, c)| (vars[*i], *c)).collect();
            if row.lhs == row.rhs {
                problem.add_constraint(expr, ComparisonOp::Eq, row.rhs);
                continue;
            }
            if row.lhs.is_finite() {
                problem.add_constraint(expr.clone(), ComparisonOp::Ge, row.lhs);
            }
            if row.rhs.is_finite() {
                problem.add_constraint(expr, ComparisonOp::Le, row.rhs);
            }
        }

        let solution = problem.solve()?;
        let x = vars.iter().map(|v| solution[*v]).collect();
        Ok((x, solution.objective()))
    }

    /// Rows of `min c'x` with bounds turned into rows; also reports which variables are free
    fn standardized(&self) -> (Vec<StdRow>, Vec<bool>) {
        let mut rows = Vec::new();
        for (idx, row) in self.rows.iter().enumerate() {
            if row.lhs == row.rhs {
                rows.push(StdRow { terms: row.terms.clone(), sense: Sense::Eq, rhs: row.rhs, origin: Some(idx) });
                continue;
            }
            if row.lhs.is_finite() {
                rows.push(StdRow { terms: row.terms.clone(), sense: Sense::Ge, rhs: row.lhs, origin: Some(idx) });
            }
            if row.rhs.is_finite() {
                rows.push(StdRow { terms: row.terms.clone(), sense: Sense::Le, rhs: row.rhs, origin: Some(idx) });
            }
        }

        let mut free = Vec::with_capacity(self.vars.len());
        for (idx, var) in self.vars.iter().enumerate() {
            free.push(var.lb < 0.0);
            if var.lb.is_finite() && var.lb != 0.0 {
                rows.push(StdRow { terms: vec![(idx, 1.0)], sense: Sense::Ge, rhs: var.lb, origin: None });
            }
            if var.ub.is_finite() {
                rows.push(StdRow { terms: vec![(idx, 1.0)], sense: Sense::Le, rhs: var.ub, origin: None });
            }
        }
        (rows, free)
    }

    /// Dual values of minimal L1 norm, or a farkas ray.
    ///
    /// Looks for y with the row signs of a dual solution, `A'y <= c`
    /// (`= c` for free x) and `b'y >= target`, minimizing `|y|_1` over a
    /// split `y = p - n` with `p, n >= 0`. Every variable starts at its
    /// finite lower bound with a positive cost, so microlp only runs its dual
    /// simplex. Without `farkas` the target is the primal optimum `obj`,
    /// with `farkas` the costs are zero and the target is one, which
    /// certifies primal infeasibility. `None` if no such y exists.
    fn dual(&self, farkas: bool, obj: f64) -> Option<Vec<f64>> {
        let (rows, free) = self.standardized();
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        // (positive part, negative part) per standardized row
        let parts: Vec<(Option<Variable>, Option<Variable>)> = rows
            .iter()
            .map(|r| {
                let pos = matches!(r.sense, Sense::Eq | Sense::Ge).then(|| problem.add_var(1.0, (0.0, f64::INFINITY)));
                let neg = matches!(r.sense, Sense::Eq | Sense::Le).then(|| problem.add_var(1.0, (0.0, f64::INFINITY)));
                (pos, neg)
            })
            .collect();

        let signed = |k: usize, a: f64| {
            let (pos, neg) = parts[k];
            pos.map(|v| (v, a)).into_iter().chain(neg.map(|v| (v, -a)))
        };

        let mut columns: Vec<Vec<(Variable, f64)>> = vec![Vec::new(); self.vars.len()];
        for (k, row) in rows.iter().enumerate() {
            for (j, a) in &row.terms {
                columns[*j].extend(signed(k, *a));
            }
        }

        for (j, column) in columns.into_iter().enumerate() {
            if column.is_empty() {
                continue;
            }
            let cost = if farkas { 0.0 } else { self.vars[j].obj };
            let expr: LinearExpr = column.into_iter().collect();
            let op = if free[j] { ComparisonOp::Eq } else { ComparisonOp::Le };
            problem.add_constraint(expr, op, cost);
        }

        let target = if farkas { 1.0 } else { obj - DUAL_OBJ_TOL * (1.0 + obj.abs()) };
        let expr: LinearExpr = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.rhs != 0.0)
            .flat_map(|(k, r)| signed(k, r.rhs))
            .collect();
        problem.add_constraint(expr, ComparisonOp::Ge, target);

        let solution = problem.solve().ok()?;

        let mut values = vec![0.0; self.rows.len()];
        for (k, row) in rows.iter().enumerate() {
            if let Some(origin) = row.origin {
                let (pos, neg) = parts[k];
                values[origin] += pos.map_or(0.0, |v| solution[v]) - neg.map_or(0.0, |v| solution[v]);
            }
        }
        Some(values)
    }
}

fn to_int_bound(value: f64) -> i32 {
    value.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

#[derive(Default)]
struct SolveResult {
    x: Vec<f64>,
    obj: f64,
    duals: Vec<f64>,
    farkas: Vec<f64>,
    has_solution: bool,
    dual_bound: f64,
}

/// Master model: always solves the continuous relaxation
pub struct MicroLpMaster {
    data: ModelData,
    result: SolveResult,
    runtime: f64,
}

/// Subproblem / compact model: solves the mixed integer program
pub struct MicroLpModel {
    data: ModelData,
    result: SolveResult,
    runtime: f64,
}

macro_rules! impl_microlp_model {
    ($model:ident) => {
        impl LPModel for $model {
            type Env = MicroLpEnv;
            type Var = MicroLpVar;
            type Constr = MicroLpConstr;

            fn new(name: &str, env: &mut MicroLpEnv) -> Self {
                $model {
                    data: ModelData { name: name.to_string(), time_limit: env.time_limit, ..Default::default() },
                    result: SolveResult::default(),
                    runtime: 0.0,
                }
            }

            fn add_var(&mut self, name: &str, var_type: VarType, obj: f64, lb: f64, ub: f64) -> MicroLpVar {
                MicroLpVar(self.data.add_var(name, var_type, obj, lb, ub))
            }

            fn add_constr(&mut self, name: &str, terms: &[(MicroLpVar, f64)], lhs: f64, rhs: f64) -> MicroLpConstr {
                let terms = terms.iter().map(|(v, c)| (v.0, *c)).collect();
                MicroLpConstr(self.data.add_row(name, terms, lhs, rhs))
            }

            fn set_objective_coefficient(&mut self, var: &MicroLpVar, value: f64) {
                self.data.vars[var.0].obj = value;
            }

            fn set_time_limit(&mut self, seconds: f64) {
                self.data.time_limit = seconds;
            }

            fn optimize(&mut self, cancel: &CancellationToken) -> SolveStatus {
                let start = Instant::now();
                let status = if cancel.is_cancelled() {
                    self.result = SolveResult { dual_bound: f64::NEG_INFINITY, ..Default::default() };
                    SolveStatus::Interrupted
                } else {
                    self.solve()
                };
                self.runtime = start.elapsed().as_secs_f64();
                status
            }

            fn get_objective(&self) -> f64 {
                self.result.obj
            }

            fn get_runtime(&self) -> f64 {
                self.runtime
            }

            fn get_x_list(&self, vars: &[MicroLpVar]) -> Vec<f64> {
                vars.iter().map(|v| self.result.x.get(v.0).copied().unwrap_or(0.0)).collect()
            }
        }

        impl $model {
            pub fn name(&self) -> &str {
                &self.data.name
            }

            pub fn num_vars(&self) -> usize {
                self.data.vars.len()
            }

            pub fn num_constrs(&self) -> usize {
                self.data.rows.len()
            }

            pub fn var_name(&self, var: MicroLpVar) -> &str {
                &self.data.vars[var.0].name
            }

            pub fn constr_name(&self, constr: MicroLpConstr) -> &str {
                &self.data.rows[constr.0].name
            }

            pub fn objective_coefficient(&self, var: MicroLpVar) -> f64 {
                self.data.vars[var.0].obj
            }
        }
    };
}

impl_microlp_model!(MicroLpMaster);
impl_microlp_model!(MicroLpModel);

impl MicroLpMaster {
    fn solve(&mut self) -> SolveStatus {
        match self.data.primal(true) {
            Ok((x, obj)) => match self.data.dual(false, obj) {
                Some(duals) => {
                    self.result = SolveResult { x, obj, duals, farkas: Vec::new(), has_solution: true, dual_bound: obj };
                    SolveStatus::Optimal
                }
                None => {
                    self.result = SolveResult { dual_bound: f64::NEG_INFINITY, ..Default::default() };
                    SolveStatus::Other
                }
            },
            Err(microlp::Error::Infeasible) => match self.data.dual(true, 0.0) {
                Some(farkas) => {
                    self.result = SolveResult { farkas, dual_bound: f64::INFINITY, ..Default::default() };
                    SolveStatus::Infeasible
                }
                None => {
                    self.result = SolveResult { dual_bound: f64::NEG_INFINITY, ..Default::default() };
                    SolveStatus::Other
                }
            },
            Err(_) => {
                self.result = SolveResult { dual_bound: f64::NEG_INFINITY, ..Default::default() };
                SolveStatus::Other
            }
        }
    }
}

impl PricedModel for MicroLpMaster {
    fn add_priced_column(&mut self, name: &str, obj: f64, _reduced_cost: f64, coefficients: &[(MicroLpConstr, f64)]) -> MicroLpVar {
        let var = self.data.add_var(name, VarType::Continuous, obj, 0.0, f64::INFINITY);
        for (row, coef) in coefficients {
            self.data.rows[row.0].terms.push((var, *coef));
        }
        MicroLpVar(var)
    }

    fn get_dual_list(&self, constrs: &[MicroLpConstr]) -> Vec<f64> {
        constrs.iter().map(|c| self.result.duals.get(c.0).copied().unwrap_or(0.0)).collect()
    }

    fn get_farkas_list(&self, constrs: &[MicroLpConstr]) -> Vec<f64> {
        constrs.iter().map(|c| self.result.farkas.get(c.0).copied().unwrap_or(0.0)).collect()
    }
}

impl MicroLpModel {
    fn solve(&mut self) -> SolveStatus {
        match self.data.primal(false) {
            Ok((x, obj)) => {
                self.result = SolveResult { x, obj, has_solution: true, dual_bound: obj, ..Default::default() };
                SolveStatus::Optimal
            }
            Err(microlp::Error::Infeasible) => {
                self.result = SolveResult { dual_bound: f64::INFINITY, ..Default::default() };
                SolveStatus::Infeasible
            }
            Err(_) => {
                self.result = SolveResult { dual_bound: f64::NEG_INFINITY, ..Default::default() };
                SolveStatus::Other
            }
        }
    }
}

impl MipModel for MicroLpModel {
    fn set_gap(&mut self, gap: f64) {
        self.data.gap = gap;
    }

    fn get_num_solutions(&self) -> usize {
        usize::from(self.result.has_solution)
    }

    fn get_solution_x_list(&mut self, k: usize, vars: &[MicroLpVar]) -> Vec<f64> {
        assert_eq!(k, 0, "microlp keeps a single solution");
        self.get_x_list(vars)
    }

    fn get_solution_objective(&mut self, k: usize) -> f64 {
        assert_eq!(k, 0, "microlp keeps a single solution");
        self.result.obj
    }

    fn get_dual_bound(&self) -> f64 {
        self.result.dual_bound
    }
}
