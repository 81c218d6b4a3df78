use std::sync::Arc;

use crate::column_generation::schedule::Schedule;
use crate::column_generation::{MipModel, SolveStatus, VarType};
use crate::instance::{Coil, EdgeKey, Instance};
use crate::misc::cancellation::CancellationToken;
use crate::misc::{FullHashMap, HashMap};

pub struct CompactSolution {
    pub obj: f64,
    pub schedules: Vec<Schedule>,
}

/// Monolithic MIP of the whole problem. Used as a baseline for column generation results.
pub struct CompactModel<S: MipModel> {
    instance: Arc<Instance>,
    model: S,
    x_vars: Vec<(EdgeKey, S::Var)>,
}

impl<S: MipModel> CompactModel<S> {
    pub fn new(instance: Arc<Instance>, env: &mut S::Env) -> Self {
        let mut model = S::new("compact", env);
        let big_m = instance.lines().map(|l| instance.big_m(l)).fold(0.0, f64::max);

        let mut x_vars = Vec::new();
        for line in instance.lines() {
            for edge in instance.edges(line) {
                let var = model.add_var(&format!("X_{}", edge), VarType::Binary, instance.stringer_cost(&edge), 0.0, 1.0);
                x_vars.push((edge, var));
            }
        }

        let mut z: HashMap<Coil, S::Var> = HashMap::default();
        let mut s: HashMap<Coil, S::Var> = HashMap::default();
        for coil in instance.regular_coils() {
            z.insert(coil, model.add_var(&format!("Z_C{}", coil.0), VarType::Binary, 0.0, 0.0, 1.0));
            s.insert(coil, model.add_var(&format!("S_C{}", coil.0), VarType::Continuous, 0.0, 0.0, big_m));
        }

        let mut outgoing: FullHashMap<Coil, Vec<usize>> = FullHashMap::default();
        let mut incoming: FullHashMap<Coil, Vec<usize>> = FullHashMap::default();
        for (idx, (e, _)) in x_vars.iter().enumerate() {
            outgoing.entry(e.from).or_default().push(idx);
            incoming.entry(e.to).or_default().push(idx);
        }
        for line in instance.lines() {
            let on_line = |e: &EdgeKey| e.line == line;
            model.add_constr(&format!("line_start_L{}", line.0), &select(&x_vars, outgoing.get(&instance.start_coil()), on_line, |_| 1.0), 1.0, 1.0);
            model.add_constr(&format!("line_end_L{}", line.0), &select(&x_vars, incoming.get(&instance.end_coil()), on_line, |_| 1.0), 1.0, 1.0);
        }

        for coil in instance.regular_coils() {
            let out = outgoing.get(&coil);
            let inc = incoming.get(&coil);

            model.add_constr(&format!("coil_partitioning_{}", coil.0), &select(&x_vars, out, |_| true, |_| 1.0), 1.0, 1.0);
            model.add_constr(&format!("visit_once_C{}", coil.0), &select(&x_vars, inc, |_| true, |_| 1.0), f64::NEG_INFINITY, 1.0);

            for line in instance.lines() {
                for &mode in instance.modes(coil, line) {
                    let mut flow = select(&x_vars, inc, |e| e.line == line && e.mode_to == mode, |_| 1.0);
                    flow.extend(select(&x_vars, out, |e| e.line == line && e.mode_from == mode, |_| -1.0));
                    model.add_constr(&format!("flow_C{}_L{}_M{}", coil.0, line.0, mode.0), &flow, 0.0, 0.0);
                }
            }

            // S_i + p_i * X_i-> - M * Z_i <= d_i
            let mut delay = vec![(s[&coil].clone(), 1.0), (z[&coil].clone(), -big_m)];
            delay.extend(select(&x_vars, out, |_| true, |e| instance.processing_time(coil, e.line, e.mode_from)));
            model.add_constr(&format!("delay_C{}", coil.0), &delay, f64::NEG_INFINITY, instance.due_date(coil));

            let mut delay_edge = vec![(z[&coil].clone(), 1.0)];
            delay_edge.extend(select(&x_vars, out, |_| true, |_| -1.0));
            model.add_constr(&format!("delay_edge_C{}", coil.0), &delay_edge, f64::NEG_INFINITY, 0.0);
        }

        // S_i - S_j + (p_i + t_ij + M) * X_ij <= M
        for i in instance.regular_coils() {
            for j in instance.regular_coils() {
                if i == j {
                    continue;
                }
                let mut linking = vec![(s[&i].clone(), 1.0), (s[&j].clone(), -1.0)];
                linking.extend(select(&x_vars, outgoing.get(&i), |e| e.to == j, |e| {
                    instance.processing_time(i, e.line, e.mode_from) + instance.setup_time(e) + big_m
                }));
                model.add_constr(&format!("start_time_C{}_C{}", i.0, j.0), &linking, f64::NEG_INFINITY, big_m);
            }
        }

        let max_delayed: Vec<(S::Var, f64)> = instance.regular_coils().map(|c| (z[&c].clone(), 1.0)).collect();
        model.add_constr("max_delayed_coils", &max_delayed, f64::NEG_INFINITY, instance.maximum_delayed_coils() as f64);

        CompactModel { instance, model, x_vars }
    }

    pub fn set_time_limit(&mut self, seconds: f64) {
        self.model.set_time_limit(seconds);
    }

    /// Optimal solution with its per line schedules, `None` if infeasible or no solution was found.
    ///
    /// Z carries no cost, so delayedness is taken from the completion times of each path.
    pub fn solve(&mut self) -> Option<CompactSolution> {
        self.model.set_gap(0.0);
        let status = self.model.optimize(&CancellationToken::new());
        if matches!(status, SolveStatus::Infeasible) || self.model.get_num_solutions() == 0 {
            return None;
        }

        let vars: Vec<S::Var> = self.x_vars.iter().map(|(_, v)| v.clone()).collect();
        let x = self.model.get_solution_x_list(0, &vars);

        let selected: Vec<EdgeKey> = self.x_vars.iter().zip(x).filter(|(_, v)| *v > 0.5).map(|((e, _), _)| *e).collect();

        let schedules = self
            .instance
            .lines()
            .map(|line| {
                let on_line: Vec<EdgeKey> = selected.iter().filter(|e| e.line == line).copied().collect();
                let mut schedule = Schedule::from_edges(&self.instance, line, on_line, std::iter::empty());
                assert!(schedule.is_valid_path(&self.instance), "compact solution of line {} is not a path: {}", line, schedule);
                for coil in schedule.late_coils(&self.instance) {
                    schedule.delayedness.insert(coil, true);
                }
                schedule
            })
            .collect();

        Some(CompactSolution {
            obj: self.model.get_solution_objective(0),
            schedules,
        })
    }
}

fn select<V: Clone>(
    x_vars: &[(EdgeKey, V)],
    indices: Option<&Vec<usize>>,
    keep: impl Fn(&EdgeKey) -> bool,
    coef: impl Fn(&EdgeKey) -> f64,
) -> Vec<(V, f64)> {
    indices
        .into_iter()
        .flatten()
        .filter(|i| keep(&x_vars[**i].0))
        .map(|i| (x_vars[*i].1.clone(), coef(&x_vars[*i].0)))
        .collect()
}
