use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::column_generation::column_pool::{ColumnId, ColumnPool};
use crate::column_generation::dual_values::DualValues;
use crate::column_generation::schedule::Schedule;
use crate::column_generation::{PricedModel, SolveStatus, VarType, INT_FEAS_TOL};
use crate::instance::{Coil, EdgeKey, Instance, ProductionLine};
use crate::misc::cancellation::CancellationToken;
use crate::misc::{FullHashMap, HashMap};
use crate::ui::{ColumnUIState, LPSolveIterationUIState, UISender, UIUserMessage};

struct MasterRows<Constr> {
    partitioning: HashMap<Coil, Constr>,
    convexity: HashMap<ProductionLine, Constr>,
    max_delayed_coils: Constr,
    original_var_x: FullHashMap<EdgeKey, Constr>,
    original_var_z: HashMap<Coil, Constr>,
}

/// Everything behind the master's mutex
pub struct MasterState<M: PricedModel> {
    pub model: M,
    rows: MasterRows<M::Constr>,
    x_vars: FullHashMap<EdgeKey, M::Var>,
    z_vars: HashMap<Coil, M::Var>,
    pool: ColumnPool<M::Var>,
    last_status: Option<SolveStatus>,
}

impl<M: PricedModel> MasterState<M> {
    pub fn pool(&self) -> &ColumnPool<M::Var> {
        &self.pool
    }

    pub fn last_status(&self) -> Option<SolveStatus> {
        self.last_status
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MasterSolveResult {
    pub status: SolveStatus,
    pub obj: Option<f64>,
    pub runtime: f64,
}

/// The restricted master problem.
///
/// Owns all master rows and every generated column. Column insertion,
/// duplicate checks and reporting of accepted columns are serialized by a
/// single mutex, so pricing threads can share the master through an `Arc`.
pub struct MasterProblem<M: PricedModel> {
    instance: Arc<Instance>,
    ui: UISender,
    state: Mutex<MasterState<M>>,
}

impl<M: PricedModel> MasterProblem<M> {
    pub fn new(instance: Arc<Instance>, env: &mut M::Env, ui: UISender) -> Self {
        let mut model = M::new("master", env);

        let mut x_vars = FullHashMap::default();
        let mut original_var_x = FullHashMap::default();
        for line in instance.lines() {
            for edge in instance.edges(line) {
                let var = model.add_var(&format!("X_{}", edge), VarType::Integer, 0.0, 0.0, 1.0);
                let row = model.add_constr(&format!("orig_var_X_{}", edge), &[(var.clone(), 1.0)], 0.0, 0.0);
                x_vars.insert(edge, var);
                original_var_x.insert(edge, row);
            }
        }

        let mut z_vars = HashMap::default();
        let mut original_var_z = HashMap::default();
        let mut partitioning = HashMap::default();
        for coil in instance.regular_coils() {
            let var = model.add_var(&format!("Z_C{}", coil.0), VarType::Integer, 0.0, 0.0, 1.0);
            let row = model.add_constr(&format!("orig_var_Z_C{}", coil.0), &[(var.clone(), 1.0)], 0.0, 0.0);
            z_vars.insert(coil, var);
            original_var_z.insert(coil, row);
            partitioning.insert(coil, model.add_constr(&format!("coil_partitioning_{}", coil.0), &[], 1.0, 1.0));
        }

        let mut convexity = HashMap::default();
        for line in instance.lines() {
            convexity.insert(line, model.add_constr(&format!("convexity_L{}", line.0), &[], 1.0, 1.0));
        }

        let max_delayed_coils = model.add_constr("max_delayed_coils", &[], f64::NEG_INFINITY, instance.maximum_delayed_coils() as f64);

        let number_of_lines = instance.number_of_lines();
        MasterProblem {
            instance,
            ui,
            state: Mutex::new(MasterState {
                model,
                rows: MasterRows {
                    partitioning,
                    convexity,
                    max_delayed_coils,
                    original_var_x,
                    original_var_z,
                },
                x_vars,
                z_vars,
                pool: ColumnPool::new(number_of_lines),
                last_status: None,
            }),
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn ui(&self) -> &UISender {
        &self.ui
    }

    /// - unrecoverable if lock fails so just unwrap
    fn lock(&self) -> MutexGuard<'_, MasterState<M>> {
        self.state.lock().unwrap()
    }

    /// Column coefficients of a schedule in every master row it touches
    fn coefficients(&self, rows: &MasterRows<M::Constr>, schedule: &Schedule) -> Vec<(M::Constr, f64)> {
        let mut coefficients = Vec::new();

        match rows.convexity.get(&schedule.line) {
            Some(row) => coefficients.push((row.clone(), 1.0)),
            None => panic!("no convexity row for line {}", schedule.line),
        }

        for coil in schedule.covered_coils(&self.instance) {
            match rows.partitioning.get(&coil) {
                Some(row) => coefficients.push((row.clone(), 1.0)),
                None => panic!("no partitioning row for coil {coil}"),
            }
        }

        let delayed = schedule.delayed_coils();
        if !delayed.is_empty() {
            coefficients.push((rows.max_delayed_coils.clone(), delayed.len() as f64));
        }

        // X - sum incidence * lambda = 0
        for edge in schedule.selected_edges() {
            match rows.original_var_x.get(&edge) {
                Some(row) => coefficients.push((row.clone(), -1.0)),
                None => panic!("no reconstruction row for edge {edge}"),
            }
        }
        for coil in delayed {
            match rows.original_var_z.get(&coil) {
                Some(row) => coefficients.push((row.clone(), -1.0)),
                None => panic!("no reconstruction row for coil {coil}"),
            }
        }

        coefficients
    }

    fn add_column_locked(&self, state: &mut MasterState<M>, schedule: Schedule) -> ColumnId {
        let id = state.pool.next_id(schedule.line);
        let coefficients = self.coefficients(&state.rows, &schedule);
        let var = state.model.add_priced_column(
            &format!("lambda_L{}_{}", id.line.0, id.index),
            schedule.schedule_cost,
            schedule.reduced_cost,
            &coefficients,
        );

        self.ui.send(UIUserMessage::ColumnAdded(ColumnUIState {
            line: id.line,
            lambda_index: id.index,
            reduced_cost: schedule.reduced_cost,
            schedule_cost: schedule.schedule_cost,
            num_coils: schedule.covered_coils(&self.instance).len(),
            num_delayed: schedule.num_delayed(),
        }));

        let stored = state.pool.push(schedule, var);
        debug_assert_eq!(stored, id);
        id
    }

    /// Adds a lambda column for `schedule` without checking for duplicates
    pub fn add_column(&self, schedule: Schedule) -> ColumnId {
        let mut state = self.lock();
        self.add_column_locked(&mut state, schedule)
    }

    /// Duplicate check and insertion under one lock.
    /// Returns `None` if the line already owns a column with the same incidence.
    pub fn add_column_if_new(&self, schedule: Schedule) -> Option<ColumnId> {
        let mut state = self.lock();
        if state.pool.find_duplicate(&schedule).is_some() {
            return None;
        }
        Some(self.add_column_locked(&mut state, schedule))
    }

    /// Whether `line` already owns a column with the same edge incidence as `schedule`
    pub fn check_already_present(&self, line: ProductionLine, schedule: &Schedule) -> bool {
        let state = self.lock();
        state.pool.columns_of_line(line).any(|c| c.schedule.same_incidence(schedule))
    }

    /// Snapshot of dual values, or farkas multipliers after an infeasible solve
    pub fn get_dual_values(&self, is_farkas: bool) -> DualValues {
        let state = self.lock();
        let model = &state.model;
        let rows = &state.rows;
        let fetch = |constrs: &[M::Constr]| -> Vec<f64> {
            if is_farkas {
                model.get_farkas_list(constrs)
            } else {
                model.get_dual_list(constrs)
            }
        };

        fn split<K: Copy, C: Clone>(rows: impl Iterator<Item = (K, C)>) -> (Vec<K>, Vec<C>) {
            rows.unzip()
        }

        let (coils, constrs) = split(rows.partitioning.iter().map(|(k, c)| (*k, c.clone())));
        let pi_partitioning = coils.into_iter().zip(fetch(&constrs)).collect();

        let (lines, constrs) = split(rows.convexity.iter().map(|(k, c)| (*k, c.clone())));
        let pi_convexity = lines.into_iter().zip(fetch(&constrs)).collect();

        let (edges, constrs) = split(rows.original_var_x.iter().map(|(k, c)| (*k, c.clone())));
        let pi_original_var_x = edges.into_iter().zip(fetch(&constrs)).collect();

        let (coils, constrs) = split(rows.original_var_z.iter().map(|(k, c)| (*k, c.clone())));
        let pi_original_var_z = coils.into_iter().zip(fetch(&constrs)).collect();

        let pi_max_delayed_coils = fetch(&[rows.max_delayed_coils.clone()])[0];

        DualValues {
            pi_partitioning,
            pi_convexity,
            pi_max_delayed_coils,
            pi_original_var_x,
            pi_original_var_z,
        }
    }

    /// Solve the current restricted master relaxation
    pub fn solve(&self, cancel: &CancellationToken) -> MasterSolveResult {
        let mut state = self.lock();
        let start = Instant::now();
        let status = state.model.optimize(cancel);
        state.last_status = Some(status);

        let obj = match status {
            SolveStatus::Optimal => Some(state.model.get_objective()),
            _ => None,
        };
        let runtime = start.elapsed().as_secs_f64().max(state.model.get_runtime());

        self.ui.send(UIUserMessage::LPSolveIterationFinish(LPSolveIterationUIState {
            obj,
            lp_runtime: runtime,
            num_columns: state.pool.count(),
            infeasible: status.is_infeasible(),
        }));

        MasterSolveResult { status, obj, runtime }
    }

    pub fn set_time_limit(&self, seconds: f64) {
        self.lock().model.set_time_limit(seconds);
    }

    pub fn num_columns(&self) -> usize {
        self.lock().pool.count()
    }

    pub fn num_columns_line(&self, line: ProductionLine) -> usize {
        self.lock().pool.count_line(line)
    }

    /// Copy of the schedule history of a line, in insertion order
    pub fn schedules(&self, line: ProductionLine) -> Vec<Schedule> {
        self.lock().pool.columns_of_line(line).map(|c| c.schedule.clone()).collect()
    }

    pub fn schedule(&self, id: ColumnId) -> Schedule {
        self.lock().pool.get_column(id).schedule.clone()
    }

    /// Lambda values of the last solve, per column
    pub fn lambda_values(&self) -> Vec<(f64, ColumnId)> {
        let state = self.lock();
        let (ids, vars): (Vec<ColumnId>, Vec<M::Var>) = state.pool.iter().map(|c| (c.id, c.var.clone())).unzip();
        if vars.is_empty() {
            return Vec::new();
        }
        state.model.get_x_list(&vars).into_iter().zip(ids).collect()
    }

    /// Schedules read from the disaggregated X and Z variables of the last solve.
    ///
    /// Only meaningful for an integral solution. Panics if the selected
    /// edges of a line do not form a path.
    pub fn reconstruct_from_original_vars(&self) -> Vec<Schedule> {
        let state = self.lock();
        let (edges, vars): (Vec<EdgeKey>, Vec<M::Var>) = state.x_vars.iter().map(|(e, v)| (*e, v.clone())).unzip();
        let x = state.model.get_x_list(&vars);
        let (coils, vars): (Vec<Coil>, Vec<M::Var>) = state.z_vars.iter().map(|(c, v)| (*c, v.clone())).unzip();
        let z = state.model.get_x_list(&vars);
        drop(state);

        let selected: Vec<EdgeKey> = edges.into_iter().zip(x).filter(|(_, v)| *v > 0.5).map(|(e, _)| e).collect();
        let delayed: Vec<Coil> = coils.into_iter().zip(z).filter(|(_, v)| *v > 0.5).map(|(c, _)| c).collect();

        self.instance
            .lines()
            .map(|line| {
                let on_line: Vec<EdgeKey> = selected.iter().filter(|e| e.line == line).copied().collect();
                let covered: Vec<Coil> = on_line.iter().map(|e| e.from).collect();
                let schedule = Schedule::from_edges(
                    &self.instance,
                    line,
                    on_line,
                    delayed.iter().filter(|c| covered.contains(*c)).copied(),
                );
                assert!(schedule.is_valid_path(&self.instance), "reconstructed schedule of line {} is not a path: {}", line, schedule);
                schedule
            })
            .collect()
    }

    /// Per line the schedule of the lambda with the largest value in the last solve
    pub fn reconstruct_from_lambdas(&self) -> Vec<Schedule> {
        let values = self.lambda_values();
        self.instance
            .lines()
            .map(|line| {
                values
                    .iter()
                    .filter(|(v, id)| id.line == line && *v > INT_FEAS_TOL)
                    .max_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, id)| self.schedule(*id))
                    .unwrap_or_else(|| Schedule::empty(line))
            })
            .collect()
    }

    /// Run `f` with exclusive access to the master's state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MasterState<M>) -> R) -> R {
        let mut state = self.lock();
        f(&mut state)
    }
}
