use gurobi::{attr, param, ConstrSense, LinExpr, Status};

use crate::column_generation::{LPEnv, LPModel, MipModel, PricedModel, SolveStatus, VarType};
use crate::misc::cancellation::CancellationToken;

pub struct GurobiEnv(pub gurobi::Env);

impl LPEnv for GurobiEnv {
    fn new_with_seed(seed: i32) -> Self {
        let mut env = gurobi::Env::new("").unwrap();
        env.set(param::Threads, 1).unwrap();
        env.set(param::Seed, seed).unwrap();
        env.set(param::OutputFlag, 0).unwrap();
        GurobiEnv(env)
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.0.set(param::TimeLimit, seconds).unwrap()
    }
}

fn to_gurobi(var_type: VarType) -> gurobi::VarType {
    match var_type {
        VarType::Continuous => gurobi::VarType::Continuous,
        VarType::Integer => gurobi::VarType::Integer,
        VarType::Binary => gurobi::VarType::Binary,
    }
}

fn from_gurobi(status: Status) -> SolveStatus {
    match status {
        Status::Optimal => SolveStatus::Optimal,
        Status::TimeLimit => SolveStatus::TimeLimit,
        Status::Interrupted => SolveStatus::Interrupted,
        Status::Infeasible | Status::InfOrUnbd => SolveStatus::Infeasible,
        _ => SolveStatus::Other,
    }
}

fn add_constr(model: &mut gurobi::Model, name: &str, terms: &[(gurobi::Var, f64)], lhs: f64, rhs: f64) -> gurobi::Constr {
    let expr = terms.iter().fold(LinExpr::new(), |expr, (var, coef)| expr.add_term(*coef, var.clone()));
    if lhs == rhs {
        model.add_constr(name, expr, ConstrSense::Equal, rhs).unwrap()
    } else if lhs.is_finite() && rhs.is_finite() {
        model.add_range(name, expr, lhs, rhs).unwrap().1
    } else if rhs.is_finite() {
        model.add_constr(name, expr, ConstrSense::Less, rhs).unwrap()
    } else {
        model.add_constr(name, expr, ConstrSense::Greater, lhs).unwrap()
    }
}

/// Runs `optimize` with a callback that terminates once `cancel` is set
fn optimize_with_token(model: &mut gurobi::Model, cancel: &CancellationToken) -> SolveStatus {
    if cancel.is_cancelled() {
        return SolveStatus::Interrupted;
    }
    model.update().unwrap();
    let token = cancel.clone();
    model
        .optimize_with_callback(move |ctx| {
            if token.is_cancelled() {
                ctx.terminate();
            }
            Ok(())
        })
        .unwrap();
    from_gurobi(model.status().unwrap())
}

/// Master: the relaxation of the restricted master, all variables continuous
pub struct GurobiMaster(pub gurobi::Model);

impl LPModel for GurobiMaster {
    type Env = GurobiEnv;
    type Var = gurobi::Var;
    type Constr = gurobi::Constr;

    fn new(name: &str, env: &mut GurobiEnv) -> Self {
        let mut model = gurobi::Model::new(name, &env.0).unwrap();
        // farkas duals on infeasibility
        model.get_env_mut().set(param::InfUnbdInfo, 1).unwrap();
        GurobiMaster(model)
    }

    fn add_var(&mut self, name: &str, _var_type: VarType, obj: f64, lb: f64, ub: f64) -> gurobi::Var {
        self.0.add_var(name, gurobi::VarType::Continuous, obj, lb, ub, &[], &[]).unwrap()
    }

    fn add_constr(&mut self, name: &str, terms: &[(gurobi::Var, f64)], lhs: f64, rhs: f64) -> gurobi::Constr {
        self.0.update().unwrap();
        add_constr(&mut self.0, name, terms, lhs, rhs)
    }

    fn set_objective_coefficient(&mut self, var: &gurobi::Var, value: f64) {
        var.set(&mut self.0, attr::Obj, value).unwrap();
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.0.get_env_mut().set(param::TimeLimit, seconds).unwrap();
    }

    fn optimize(&mut self, cancel: &CancellationToken) -> SolveStatus {
        optimize_with_token(&mut self.0, cancel)
    }

    fn get_objective(&self) -> f64 {
        self.0.get(attr::ObjVal).unwrap()
    }

    fn get_runtime(&self) -> f64 {
        self.0.get(attr::Runtime).unwrap()
    }

    fn get_x_list(&self, vars: &[gurobi::Var]) -> Vec<f64> {
        self.0.get_values(attr::X, vars).unwrap()
    }
}

impl PricedModel for GurobiMaster {
    fn add_priced_column(&mut self, name: &str, obj: f64, _reduced_cost: f64, coefficients: &[(gurobi::Constr, f64)]) -> gurobi::Var {
        let (constrs, coefs): (Vec<gurobi::Constr>, Vec<f64>) = coefficients.iter().cloned().unzip();
        self.0.add_var(name, gurobi::VarType::Continuous, obj, 0.0, gurobi::INFINITY, &constrs, &coefs).unwrap()
    }

    fn get_dual_list(&self, constrs: &[gurobi::Constr]) -> Vec<f64> {
        self.0.get_values(attr::Pi, constrs).unwrap()
    }

    fn get_farkas_list(&self, constrs: &[gurobi::Constr]) -> Vec<f64> {
        // gurobi orients the ray the other way round
        self.0.get_values(attr::FarkasDual, constrs).unwrap().into_iter().map(|v| -v).collect()
    }
}

/// Subproblem and compact model
pub struct GurobiMip(pub gurobi::Model);

impl LPModel for GurobiMip {
    type Env = GurobiEnv;
    type Var = gurobi::Var;
    type Constr = gurobi::Constr;

    fn new(name: &str, env: &mut GurobiEnv) -> Self {
        GurobiMip(gurobi::Model::new(name, &env.0).unwrap())
    }

    fn add_var(&mut self, name: &str, var_type: VarType, obj: f64, lb: f64, ub: f64) -> gurobi::Var {
        self.0.add_var(name, to_gurobi(var_type), obj, lb, ub, &[], &[]).unwrap()
    }

    fn add_constr(&mut self, name: &str, terms: &[(gurobi::Var, f64)], lhs: f64, rhs: f64) -> gurobi::Constr {
        self.0.update().unwrap();
        add_constr(&mut self.0, name, terms, lhs, rhs)
    }

    fn set_objective_coefficient(&mut self, var: &gurobi::Var, value: f64) {
        var.set(&mut self.0, attr::Obj, value).unwrap();
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.0.get_env_mut().set(param::TimeLimit, seconds).unwrap();
    }

    fn optimize(&mut self, cancel: &CancellationToken) -> SolveStatus {
        match optimize_with_token(&mut self.0, cancel) {
            // solution found within the requested gap
            SolveStatus::Optimal if self.0.get_env().get(param::MIPGap).unwrap() > 0.0 => SolveStatus::GapLimit,
            status => status,
        }
    }

    fn get_objective(&self) -> f64 {
        self.0.get(attr::ObjVal).unwrap()
    }

    fn get_runtime(&self) -> f64 {
        self.0.get(attr::Runtime).unwrap()
    }

    fn get_x_list(&self, vars: &[gurobi::Var]) -> Vec<f64> {
        self.0.get_values(attr::X, vars).unwrap()
    }
}

impl MipModel for GurobiMip {
    fn set_gap(&mut self, gap: f64) {
        self.0.get_env_mut().set(param::MIPGap, gap).unwrap();
    }

    fn get_num_solutions(&self) -> usize {
        self.0.get(attr::SolCount).unwrap().max(0) as usize
    }

    fn get_solution_x_list(&mut self, k: usize, vars: &[gurobi::Var]) -> Vec<f64> {
        self.0.get_env_mut().set(param::SolutionNumber, k as i32).unwrap();
        self.0.get_values(attr::Xn, vars).unwrap()
    }

    fn get_solution_objective(&mut self, k: usize) -> f64 {
        self.0.get_env_mut().set(param::SolutionNumber, k as i32).unwrap();
        self.0.get(attr::PoolObjVal).unwrap()
    }

    fn get_dual_bound(&self) -> f64 {
        self.0.get(attr::ObjBound).unwrap()
    }
}
