use std::sync::Arc;

use itertools::Itertools;

use crate::column_generation::dual_values::DualValues;
use crate::column_generation::schedule::Schedule;
use crate::column_generation::{MipModel, PricingSettings, SolveStatus, VarType};
use crate::instance::{Coil, EdgeKey, Instance, ProductionLine};
use crate::misc::cancellation::CancellationToken;
use crate::misc::FullHashMap;

/// Pricing problem of a single line.
///
/// A sequencing MIP over the line's edges whose objective is the reduced
/// cost of the resulting column. The engine model is built once and kept
/// across pricing rounds, only its objective is rewritten.
pub struct SubProblem<S: MipModel> {
    instance: Arc<Instance>,
    line: ProductionLine,
    model: S,

    edges: Vec<EdgeKey>,
    x_vars: Vec<S::Var>,
    delay_coils: Vec<Coil>,
    z_vars: Vec<S::Var>,
    z_costs: Vec<f64>,
    one_var: S::Var,
    big_m: f64,

    gap: f64,
    dynamic_gap: f64,
    initial_dynamic_gap: f64,
    time_limit: f64,
    default_time_limit: f64,
    tolerance: f64,

    cancel: CancellationToken,
    last_status: Option<SolveStatus>,
    last_runtime: f64,
}

impl<S: MipModel> SubProblem<S> {
    pub fn new(instance: Arc<Instance>, line: ProductionLine, env: &mut S::Env, settings: &PricingSettings) -> Self {
        let mut model = S::new(&format!("pricing_L{}", line.0), env);
        let big_m = instance.big_m(line);
        let edges = instance.edges(line);

        let x_vars: Vec<S::Var> = edges
            .iter()
            .map(|e| model.add_var(&format!("X_{}", e), VarType::Binary, instance.stringer_cost(e), 0.0, 1.0))
            .collect();

        let delay_coils: Vec<Coil> = instance.regular_coils().collect();
        let z_vars: Vec<S::Var> = delay_coils
            .iter()
            .map(|c| model.add_var(&format!("Z_C{}", c.0), VarType::Binary, 0.0, 0.0, 1.0))
            .collect();
        let s_vars: Vec<S::Var> = delay_coils
            .iter()
            .map(|c| model.add_var(&format!("S_C{}", c.0), VarType::Continuous, 0.0, 0.0, big_m))
            .collect();

        // carries the constant part of the reduced cost
        let one_var = model.add_var("one", VarType::Continuous, 0.0, 1.0, 1.0);

        let mut outgoing: FullHashMap<Coil, Vec<usize>> = FullHashMap::default();
        let mut incoming: FullHashMap<Coil, Vec<usize>> = FullHashMap::default();
        for (idx, e) in edges.iter().enumerate() {
            outgoing.entry(e.from).or_default().push(idx);
            incoming.entry(e.to).or_default().push(idx);
        }
        let terms = |indices: Option<&Vec<usize>>, coef: f64| -> Vec<(S::Var, f64)> {
            indices
                .map(|v| v.iter().map(|i| (x_vars[*i].clone(), coef)).collect())
                .unwrap_or_default()
        };

        // exactly one edge leaves the start, exactly one enters the end
        model.add_constr(&format!("line_start_L{}", line.0), &terms(outgoing.get(&instance.start_coil()), 1.0), 1.0, 1.0);
        model.add_constr(&format!("line_end_L{}", line.0), &terms(incoming.get(&instance.end_coil()), 1.0), 1.0, 1.0);

        for (pos, coil) in delay_coils.iter().enumerate() {
            let out = outgoing.get(coil);
            let inc = incoming.get(coil);

            for &mode in instance.modes(*coil, line) {
                let mut flow: Vec<(S::Var, f64)> = Vec::new();
                flow.extend(inc.into_iter().flatten().filter(|i| edges[**i].mode_to == mode).map(|i| (x_vars[*i].clone(), 1.0)));
                flow.extend(out.into_iter().flatten().filter(|i| edges[**i].mode_from == mode).map(|i| (x_vars[*i].clone(), -1.0)));
                model.add_constr(&format!("flow_C{}_L{}_M{}", coil.0, line.0, mode.0), &flow, 0.0, 0.0);
            }

            model.add_constr(&format!("visit_once_C{}", coil.0), &terms(inc, 1.0), f64::NEG_INFINITY, 1.0);

            // S_i + p_i * X_i-> - d_i - M * Z_i <= 0
            let mut delay = vec![(s_vars[pos].clone(), 1.0)];
            delay.extend(out.into_iter().flatten().map(|i| {
                (x_vars[*i].clone(), instance.processing_time(*coil, line, edges[*i].mode_from))
            }));
            delay.push((one_var.clone(), -instance.due_date(*coil)));
            delay.push((z_vars[pos].clone(), -big_m));
            model.add_constr(&format!("delay_C{}", coil.0), &delay, f64::NEG_INFINITY, 0.0);

            // only coils on this line may be delayed
            let mut delay_edge = vec![(z_vars[pos].clone(), 1.0)];
            delay_edge.extend(terms(out, -1.0));
            model.add_constr(&format!("delay_edge_C{}", coil.0), &delay_edge, f64::NEG_INFINITY, 0.0);
        }

        // S_i - S_j + (p_i + t_ij + M) * X_ij - M <= 0
        for ((pos_i, i), (pos_j, j)) in delay_coils.iter().enumerate().cartesian_product(delay_coils.iter().enumerate()) {
            if i == j {
                continue;
            }
            let mut linking = vec![(s_vars[pos_i].clone(), 1.0), (s_vars[pos_j].clone(), -1.0)];
            linking.extend(outgoing.get(i).into_iter().flatten().filter(|e| edges[**e].to == *j).map(|e| {
                let edge = &edges[*e];
                let coef = instance.processing_time(*i, line, edge.mode_from) + instance.setup_time(edge) + big_m;
                (x_vars[*e].clone(), coef)
            }));
            linking.push((one_var.clone(), -big_m));
            model.add_constr(&format!("start_time_C{}_C{}", i.0, j.0), &linking, f64::NEG_INFINITY, 0.0);
        }

        let max_delayed: Vec<(S::Var, f64)> = z_vars.iter().map(|z| (z.clone(), 1.0)).collect();
        model.add_constr("max_delayed_coils", &max_delayed, f64::NEG_INFINITY, instance.maximum_delayed_coils() as f64);

        SubProblem {
            instance,
            line,
            model,
            edges,
            x_vars,
            delay_coils,
            z_costs: vec![0.0; z_vars.len()],
            z_vars,
            one_var,
            big_m,
            gap: settings.nominal_gap,
            dynamic_gap: settings.dynamic_gap,
            initial_dynamic_gap: settings.dynamic_gap,
            time_limit: settings.dynamic_gap_time_limit,
            default_time_limit: settings.dynamic_gap_time_limit,
            tolerance: settings.reduced_cost_tolerance,
            cancel: CancellationToken::new(),
            last_status: None,
            last_runtime: 0.0,
        }
    }

    pub fn line(&self) -> ProductionLine {
        self.line
    }

    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    /// Rewrite every objective coefficient from `duals`.
    ///
    /// Farkas pricing drops the stringer costs but keeps all dual terms.
    pub fn update_objective(&mut self, duals: &DualValues, is_farkas: bool) {
        for (edge, var) in self.edges.iter().zip(&self.x_vars) {
            let value = duals.edge_coefficient(&self.instance, edge, is_farkas);
            self.model.set_objective_coefficient(var, value);
        }
        for ((coil, var), cost) in self.delay_coils.iter().zip(&self.z_vars).zip(self.z_costs.iter_mut()) {
            *cost = duals.delay_coefficient(*coil);
            self.model.set_objective_coefficient(var, *cost);
        }
        self.model.set_objective_coefficient(&self.one_var, -duals.convexity(self.line));
    }

    /// Solve with the current gap and time limit.
    ///
    /// Returns every solution the engine reports, ascending by reduced cost,
    /// or the empty sentinel schedule if there is none.
    ///
    /// The model only forces Z up for late coils, so delayedness is taken
    /// from the completion times of the path instead and the reduced cost is
    /// corrected by the Z terms that change.
    pub fn solve(&mut self) -> Vec<Schedule> {
        self.model.set_gap(self.gap);
        self.model.set_time_limit(self.time_limit);
        let status = self.model.optimize(&self.cancel);
        self.last_status = Some(status);
        self.last_runtime = self.model.get_runtime();

        let num_solutions = self.model.get_num_solutions();
        if num_solutions == 0 {
            return vec![Schedule::empty(self.line)];
        }

        let mut schedules = Vec::with_capacity(num_solutions);
        for k in 0..num_solutions {
            let x = self.model.get_solution_x_list(k, &self.x_vars);
            let z = self.model.get_solution_x_list(k, &self.z_vars);
            let objective = self.model.get_solution_objective(k);

            let selected = self.edges.iter().zip(x).filter(|(_, v)| *v > 0.5).map(|(e, _)| *e);
            let mut schedule = Schedule::from_edges(&self.instance, self.line, selected, std::iter::empty());

            let late = schedule.late_coils(&self.instance);
            let mut correction = 0.0;
            for ((coil, value), cost) in self.delay_coils.iter().zip(z).zip(&self.z_costs) {
                let claimed = value > 0.5;
                let is_late = late.contains(coil);
                if is_late {
                    schedule.delayedness.insert(*coil, true);
                }
                if is_late != claimed {
                    correction += if is_late { *cost } else { -*cost };
                }
            }
            schedule.set_reduced_cost(objective + correction, self.tolerance);
            schedules.push(schedule);
        }

        schedules.sort_by(|a, b| a.reduced_cost.total_cmp(&b.reduced_cost));
        schedules
    }

    pub fn set_gap(&mut self, gap: f64) {
        self.gap = gap;
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn dynamic_gap(&self) -> f64 {
        self.dynamic_gap
    }

    pub fn set_dynamic_gap(&mut self, gap: f64) {
        self.dynamic_gap = gap;
    }

    pub fn reset_dynamic_gap(&mut self) {
        self.dynamic_gap = self.initial_dynamic_gap;
    }

    pub fn set_time_limit(&mut self, seconds: f64) {
        self.time_limit = seconds;
    }

    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn reset_time_limit(&mut self) {
        self.time_limit = self.default_time_limit;
    }

    /// Token polled by the engine during subsequent solves
    pub fn attach_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn interrupt_solving(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn was_interrupted(&self) -> bool {
        self.last_status.map_or(false, |s| s.is_interrupted())
    }

    pub fn last_status(&self) -> Option<SolveStatus> {
        self.last_status
    }

    pub fn last_runtime(&self) -> f64 {
        self.last_runtime
    }

    pub fn get_dual_bound(&self) -> f64 {
        self.model.get_dual_bound()
    }

    pub fn is_dual_bound_negative(&self) -> bool {
        self.get_dual_bound() < -self.tolerance
    }

    /// The last solve was completed and proved that no improving column exists
    pub fn proves_no_column(&self) -> bool {
        self.last_status.map_or(false, |s| s.is_complete()) && !self.is_dual_bound_negative()
    }

    pub fn model(&self) -> &S {
        &self.model
    }
}
