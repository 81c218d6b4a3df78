#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use coil_bnp::misc::FullHashMap;
use coil_bnp::{
    CancellationToken, Coil, EdgeKey, Instance, LPEnv, LPModel, MipModel, Mode, PricedModel, ProductionLine, SolveStatus, VarType,
};

/// Instance from the text format, panics on errors
pub fn parse(text: &str) -> Arc<Instance> {
    Arc::new(Instance::parse(text).unwrap())
}

/// One line, two coils, one mode. The only cheap order is start, 0, 1, end with cost 5.
pub const TWO_COILS: &str = "
X two coils on one line
I 2
K 1
M 1
a 0
m 0 0 0 1
m 1 0 0 1
d 0 1000
d 1 1000
p 0 0 0 1
p 1 0 0 1
c -1 0 0 0 0 0
c 0 1 0 0 0 5
c 1 2 0 0 0 0
c -1 1 0 0 0 10
c 1 0 0 0 0 10
c 0 2 0 0 0 10
";

/// Like [`TWO_COILS`] but whichever coil runs second misses its due date
pub fn forced_delay(max_delayed: usize) -> String {
    format!(
        "
I 2
K 1
M 1
a {max_delayed}
m 0 0 0 1
m 1 0 0 1
d 0 10
d 1 10
p 0 0 0 6
p 1 0 0 6
c -1 0 0 0 0 0
c 0 1 0 0 0 5
c 1 2 0 0 0 0
c -1 1 0 0 0 10
c 1 0 0 0 0 10
c 0 2 0 0 0 10
"
    )
}

/// `coils` coils on `lines` lines, one mode each, with deterministic pseudo random costs
pub fn grid_instance(coils: usize, lines: usize, max_delayed: usize) -> Arc<Instance> {
    let mut instance = Instance::new(coils, lines, 1, max_delayed);
    for coil in instance.regular_coils().collect::<Vec<_>>() {
        instance.set_due_date(coil, 4.0 + 3.0 * coil.0 as f64);
        for line in instance.lines().collect::<Vec<_>>() {
            instance.enable_mode(coil, line, Mode(0));
            instance.set_processing_time(coil, line, Mode(0), 2.0 + f64::from(line.0));
        }
    }
    for line in instance.lines().collect::<Vec<_>>() {
        for edge in instance.edges(line) {
            let cost = ((edge.from.0 + 2) * 7 + (edge.to.0 + 1) * 3 + edge.line.0 as i32 * 5) % 11;
            instance.set_stringer_cost(edge, f64::from(cost));
            instance.set_setup_time(edge, f64::from(cost % 3));
        }
    }
    instance.validate().unwrap();
    Arc::new(instance)
}

pub fn edge(from: i32, to: i32, line: u32) -> EdgeKey {
    EdgeKey::new(Coil(from), Coil(to), ProductionLine(line), Mode(0), Mode(0))
}

/// Name of the subproblem variable of an edge
pub fn x_name(from: i32, to: i32, line: u32) -> String {
    format!("X_{}", edge(from, to, line))
}

/// Variable names of a path through `coils` on `line`, ending at `end`
pub fn path(coils: &[i32], line: u32, end: i32) -> Vec<String> {
    let mut names = Vec::new();
    let mut previous = -1;
    for &coil in coils.iter().chain(std::iter::once(&end)) {
        names.push(x_name(previous, coil, line));
        previous = coil;
    }
    names
}

#[derive(Clone, Default)]
pub struct FakeEnv {
    pub script: Arc<MipScript>,
}

impl LPEnv for FakeEnv {
    fn new_with_seed(_seed: i32) -> Self {
        Self::default()
    }

    fn set_time_limit(&mut self, _seconds: f64) {}
}

#[derive(Clone, Debug)]
pub struct RecordedColumn {
    pub name: String,
    pub obj: f64,
    pub coefficients: Vec<(String, f64)>,
}

/// Master engine that records everything and hands out preset duals by row name
pub struct RecordingMaster {
    pub vars: Vec<String>,
    pub constrs: Vec<String>,
    pub columns: Vec<RecordedColumn>,
    pub duals: FullHashMap<String, f64>,
    pub farkas: FullHashMap<String, f64>,
    pub status: SolveStatus,
    pub optimize_calls: usize,
}

impl RecordingMaster {
    pub fn column(&self, name: &str) -> &RecordedColumn {
        self.columns.iter().find(|c| c.name == name).unwrap()
    }
}

impl LPModel for RecordingMaster {
    type Env = FakeEnv;
    type Var = usize;
    type Constr = usize;

    fn new(_name: &str, _env: &mut FakeEnv) -> Self {
        RecordingMaster {
            vars: Vec::new(),
            constrs: Vec::new(),
            columns: Vec::new(),
            duals: FullHashMap::default(),
            farkas: FullHashMap::default(),
            status: SolveStatus::Optimal,
            optimize_calls: 0,
        }
    }

    fn add_var(&mut self, name: &str, _var_type: VarType, _obj: f64, _lb: f64, _ub: f64) -> usize {
        self.vars.push(name.to_string());
        self.vars.len() - 1
    }

    fn add_constr(&mut self, name: &str, _terms: &[(usize, f64)], _lhs: f64, _rhs: f64) -> usize {
        self.constrs.push(name.to_string());
        self.constrs.len() - 1
    }

    fn set_objective_coefficient(&mut self, _var: &usize, _value: f64) {}

    fn set_time_limit(&mut self, _seconds: f64) {}

    fn optimize(&mut self, _cancel: &CancellationToken) -> SolveStatus {
        self.optimize_calls += 1;
        self.status
    }

    fn get_objective(&self) -> f64 {
        0.0
    }

    fn get_runtime(&self) -> f64 {
        0.0
    }

    fn get_x_list(&self, vars: &[usize]) -> Vec<f64> {
        vec![0.0; vars.len()]
    }
}

impl PricedModel for RecordingMaster {
    fn add_priced_column(&mut self, name: &str, obj: f64, _reduced_cost: f64, coefficients: &[(usize, f64)]) -> usize {
        self.columns.push(RecordedColumn {
            name: name.to_string(),
            obj,
            coefficients: coefficients.iter().map(|(c, v)| (self.constrs[*c].clone(), *v)).collect(),
        });
        self.vars.push(name.to_string());
        self.vars.len() - 1
    }

    fn get_dual_list(&self, constrs: &[usize]) -> Vec<f64> {
        constrs.iter().map(|c| self.duals.get(&self.constrs[*c]).copied().unwrap_or(0.0)).collect()
    }

    fn get_farkas_list(&self, constrs: &[usize]) -> Vec<f64> {
        constrs.iter().map(|c| self.farkas.get(&self.constrs[*c]).copied().unwrap_or(0.0)).collect()
    }
}

/// What a scripted subproblem engine reports for every solve
#[derive(Clone, Debug)]
pub struct LineBehaviour {
    /// Selected variable names and objective per solution, best first
    pub solutions: Vec<(Vec<String>, f64)>,
    pub status: SolveStatus,
    pub dual_bound: f64,
    /// Block until the token is cancelled, then report an interruption
    pub wait_for_cancel: bool,
    pub delay: Duration,
}

impl Default for LineBehaviour {
    fn default() -> Self {
        LineBehaviour {
            solutions: Vec::new(),
            status: SolveStatus::Optimal,
            dual_bound: 0.0,
            wait_for_cancel: false,
            delay: Duration::ZERO,
        }
    }
}

impl LineBehaviour {
    /// Finds the given path with objective `obj` and proves nothing better exists
    pub fn finds(selected: Vec<String>, obj: f64) -> Self {
        LineBehaviour {
            solutions: vec![(selected, obj)],
            dual_bound: obj,
            ..Default::default()
        }
    }

    /// Reports `selected` but never proves anything, so the gap ladder keeps going
    pub fn stuck_on(selected: Vec<String>, obj: f64) -> Self {
        LineBehaviour {
            solutions: vec![(selected, obj)],
            status: SolveStatus::GapLimit,
            dual_bound: f64::NEG_INFINITY,
            ..Default::default()
        }
    }

    pub fn waits_for_cancel() -> Self {
        LineBehaviour {
            wait_for_cancel: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct SolveRecord {
    pub model: String,
    pub gap: f64,
    pub interrupted: bool,
}

/// Behaviours keyed by model name (`pricing_L{l}`) plus a log of every solve
#[derive(Default)]
pub struct MipScript {
    behaviours: Mutex<FullHashMap<String, LineBehaviour>>,
    log: Mutex<Vec<SolveRecord>>,
}

impl MipScript {
    pub fn set(&self, line: u32, behaviour: LineBehaviour) {
        self.behaviours.lock().unwrap().insert(format!("pricing_L{line}"), behaviour);
    }

    pub fn solves(&self, line: u32) -> Vec<SolveRecord> {
        let name = format!("pricing_L{line}");
        self.log.lock().unwrap().iter().filter(|r| r.model == name).cloned().collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }
}

/// Subproblem engine replaying a [`LineBehaviour`]
pub struct ScriptedMip {
    name: String,
    script: Arc<MipScript>,
    vars: Vec<String>,
    objective: Vec<f64>,
    gap: f64,
    current: Option<LineBehaviour>,
}

impl ScriptedMip {
    pub fn objective_coefficient(&self, name: &str) -> f64 {
        let idx = self.vars.iter().position(|v| v == name).unwrap();
        self.objective[idx]
    }

    fn values_of(&self, k: usize, vars: &[usize]) -> Vec<f64> {
        let selected = &self.current.as_ref().unwrap().solutions[k].0;
        vars.iter()
            .map(|v| if selected.contains(&self.vars[*v]) { 1.0 } else { 0.0 })
            .collect()
    }

    fn objective_of(&self, k: usize) -> f64 {
        self.current.as_ref().unwrap().solutions[k].1
    }
}

impl LPModel for ScriptedMip {
    type Env = FakeEnv;
    type Var = usize;
    type Constr = usize;

    fn new(name: &str, env: &mut FakeEnv) -> Self {
        ScriptedMip {
            name: name.to_string(),
            script: env.script.clone(),
            vars: Vec::new(),
            objective: Vec::new(),
            gap: 0.0,
            current: None,
        }
    }

    fn add_var(&mut self, name: &str, _var_type: VarType, obj: f64, _lb: f64, _ub: f64) -> usize {
        self.vars.push(name.to_string());
        self.objective.push(obj);
        self.vars.len() - 1
    }

    fn add_constr(&mut self, _name: &str, _terms: &[(usize, f64)], _lhs: f64, _rhs: f64) -> usize {
        0
    }

    fn set_objective_coefficient(&mut self, var: &usize, value: f64) {
        self.objective[*var] = value;
    }

    fn set_time_limit(&mut self, _seconds: f64) {}

    fn optimize(&mut self, cancel: &CancellationToken) -> SolveStatus {
        let behaviour = self.script.behaviours.lock().unwrap().get(&self.name).cloned().unwrap_or_default();

        let start = Instant::now();
        let mut interrupted = cancel.is_cancelled();
        while !interrupted && (start.elapsed() < behaviour.delay || (behaviour.wait_for_cancel && start.elapsed() < Duration::from_secs(10))) {
            std::thread::sleep(Duration::from_millis(1));
            interrupted = cancel.is_cancelled();
        }

        self.script.log.lock().unwrap().push(SolveRecord {
            model: self.name.clone(),
            gap: self.gap,
            interrupted,
        });

        if interrupted || behaviour.wait_for_cancel {
            self.current = Some(LineBehaviour {
                dual_bound: f64::NEG_INFINITY,
                ..Default::default()
            });
            return SolveStatus::Interrupted;
        }
        let status = behaviour.status;
        self.current = Some(behaviour);
        status
    }

    fn get_objective(&self) -> f64 {
        self.objective_of(0)
    }

    fn get_runtime(&self) -> f64 {
        0.0
    }

    fn get_x_list(&self, vars: &[usize]) -> Vec<f64> {
        self.values_of(0, vars)
    }
}

impl MipModel for ScriptedMip {
    fn set_gap(&mut self, gap: f64) {
        self.gap = gap;
    }

    fn get_num_solutions(&self) -> usize {
        self.current.as_ref().map_or(0, |b| b.solutions.len())
    }

    fn get_solution_x_list(&mut self, k: usize, vars: &[usize]) -> Vec<f64> {
        self.values_of(k, vars)
    }

    fn get_solution_objective(&mut self, k: usize) -> f64 {
        self.objective_of(k)
    }

    fn get_dual_bound(&self) -> f64 {
        self.current.as_ref().map_or(f64::NEG_INFINITY, |b| b.dual_bound)
    }
}
