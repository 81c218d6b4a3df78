use std::fmt::{Display, Formatter};

use crate::column_generation::INT_FEAS_TOL;
use crate::instance::{Coil, EdgeKey, Instance, Mode, ProductionLine};
use crate::misc::{FullHashMap, HashMap};

/// One candidate production plan of a single line, the master's column.
///
/// Built by a subproblem solve (or as an artificial trivial column) and
/// never mutated after it was handed to the master, except for the cached
/// `lambda_index`.
#[derive(Clone, Debug)]
pub struct Schedule {
    pub line: ProductionLine,
    pub reduced_cost: f64,
    pub reduced_cost_negative: bool,
    pub schedule_cost: f64,
    pub edges: FullHashMap<EdgeKey, bool>,
    pub delayedness: HashMap<Coil, bool>,
    /// Position of the lambda variable within the line, set by the master
    pub lambda_index: Option<usize>,
    /// Expensive seed column, never considered a duplicate of a priced one
    pub artificial: bool,
}

impl Schedule {
    /// Sentinel for "no solution". Never improving.
    pub fn empty(line: ProductionLine) -> Self {
        Schedule {
            line,
            reduced_cost: 0.0,
            reduced_cost_negative: false,
            schedule_cost: 0.0,
            edges: FullHashMap::default(),
            delayedness: HashMap::default(),
            lambda_index: None,
            artificial: false,
        }
    }

    pub fn from_edges<E, D>(instance: &Instance, line: ProductionLine, selected: E, delayed: D) -> Self
    where
        E: IntoIterator<Item = EdgeKey>,
        D: IntoIterator<Item = Coil>,
    {
        let mut schedule = Schedule::empty(line);
        for edge in selected {
            debug_assert_eq!(edge.line, line);
            schedule.schedule_cost += instance.stringer_cost(&edge);
            schedule.edges.insert(edge, true);
        }
        for coil in instance.regular_coils() {
            schedule.delayedness.insert(coil, false);
        }
        for coil in delayed {
            if instance.is_regular(coil) {
                schedule.delayedness.insert(coil, true);
            }
        }
        schedule
    }

    pub fn set_reduced_cost(&mut self, reduced_cost: f64, tolerance: f64) {
        self.reduced_cost = reduced_cost;
        self.reduced_cost_negative = reduced_cost < -tolerance;
    }

    pub fn is_empty(&self) -> bool {
        !self.edges.values().any(|selected| *selected)
    }

    /// Selected edges in a stable order
    pub fn selected_edges(&self) -> Vec<EdgeKey> {
        let mut edges: Vec<EdgeKey> = self.edges.iter().filter(|(_, s)| **s).map(|(e, _)| *e).collect();
        edges.sort_unstable();
        edges
    }

    /// Regular coils left by a selected edge, ascending
    pub fn covered_coils(&self, instance: &Instance) -> Vec<Coil> {
        let mut coils: Vec<Coil> = self
            .edges
            .iter()
            .filter(|(e, s)| **s && instance.is_regular(e.from))
            .map(|(e, _)| e.from)
            .collect();
        coils.sort_unstable();
        coils.dedup();
        coils
    }

    pub fn delayed_coils(&self) -> Vec<Coil> {
        let mut coils: Vec<Coil> = self.delayedness.iter().filter(|(_, d)| **d).map(|(c, _)| *c).collect();
        coils.sort_unstable();
        coils
    }

    pub fn num_delayed(&self) -> usize {
        self.delayedness.values().filter(|d| **d).count()
    }

    pub fn is_delayed(&self, coil: Coil) -> bool {
        self.delayedness.get(&coil).copied().unwrap_or(false)
    }

    /// Same line and exactly the same selected edges
    pub fn same_incidence(&self, other: &Schedule) -> bool {
        if self.line != other.line || self.artificial != other.artificial {
            return false;
        }
        let selected = self.edges.values().filter(|s| **s).count();
        let other_selected = other.edges.values().filter(|s| **s).count();
        selected == other_selected && self.edges.iter().filter(|(_, s)| **s).all(|(e, _)| other.edges.get(e).copied().unwrap_or(false))
    }

    fn successor(&self, coil: Coil, mode: Option<Mode>) -> Option<EdgeKey> {
        self.edges
            .iter()
            .filter(|(e, s)| **s && e.from == coil && mode.map_or(true, |m| e.mode_from == m))
            .map(|(e, _)| *e)
            .min()
    }

    /// Regular coils in production order with their modes.
    ///
    /// Panics if the selected edges do not form a path from the start to the end coil.
    pub fn sequence(&self, instance: &Instance) -> Vec<(Coil, Mode)> {
        let mut sequence = Vec::new();
        if self.is_empty() {
            return sequence;
        }

        let mut current = instance.start_coil();
        let mut mode = None;
        let mut steps = 0;
        while !instance.is_end(current) {
            let edge = match self.successor(current, mode) {
                Some(edge) => edge,
                None => panic!("schedule of line {} has no successor for coil {}: {}", self.line, current, self),
            };
            steps += 1;
            assert!(steps <= self.edges.len(), "schedule of line {} contains a cycle: {}", self.line, self);
            if instance.is_regular(edge.to) {
                sequence.push((edge.to, edge.mode_to));
            }
            current = edge.to;
            mode = Some(edge.mode_to);
        }
        sequence
    }

    /// Completion time of every regular coil in production order.
    ///
    /// Coils start as early as the path allows: the first at zero, every
    /// other one when its predecessor is processed and set up for it.
    pub fn completion_times(&self, instance: &Instance) -> Vec<(Coil, f64)> {
        let mut times = Vec::new();
        let mut previous: Option<(Coil, Mode, f64)> = None;
        for (coil, mode) in self.sequence(instance) {
            let start = match previous {
                Some((prev, prev_mode, completion)) => {
                    completion + instance.setup_time(&EdgeKey::new(prev, coil, self.line, prev_mode, mode))
                }
                None => 0.0,
            };
            let completion = start + instance.processing_time(coil, self.line, mode);
            times.push((coil, completion));
            previous = Some((coil, mode, completion));
        }
        times
    }

    /// Coils completed after their due date, ascending
    pub fn late_coils(&self, instance: &Instance) -> Vec<Coil> {
        let mut coils: Vec<Coil> = self
            .completion_times(instance)
            .into_iter()
            .filter(|(coil, completion)| *completion > instance.due_date(*coil) + INT_FEAS_TOL)
            .map(|(coil, _)| coil)
            .collect();
        coils.sort_unstable();
        coils
    }

    /// Selected edges form exactly one simple path from the start to the end coil
    pub fn is_valid_path(&self, instance: &Instance) -> bool {
        let selected = self.selected_edges();
        if selected.is_empty() {
            return true;
        }

        let mut out_degree: FullHashMap<Coil, usize> = FullHashMap::default();
        let mut in_degree: FullHashMap<Coil, usize> = FullHashMap::default();
        for e in &selected {
            if e.line != self.line {
                return false;
            }
            *out_degree.entry(e.from).or_default() += 1;
            *in_degree.entry(e.to).or_default() += 1;
        }
        if out_degree.values().any(|d| *d > 1) || in_degree.values().any(|d| *d > 1) {
            return false;
        }

        // walk and make sure every selected edge is used exactly once
        let mut current = instance.start_coil();
        let mut mode = None;
        let mut used = 0;
        while !instance.is_end(current) {
            match self.successor(current, mode) {
                Some(edge) => {
                    used += 1;
                    if used > selected.len() {
                        return false;
                    }
                    current = edge.to;
                    mode = Some(edge.mode_to);
                }
                None => return false,
            }
        }
        used == selected.len()
    }
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.same_incidence(other)
    }
}

impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let edges = self
            .selected_edges()
            .iter()
            .map(|e| format!("{}({})->{}({})", e.from.0, e.mode_from.0, e.to.0, e.mode_to.0))
            .collect::<Vec<String>>()
            .join(" ");
        write!(
            f,
            "L{line} cost=<{cost}> rc=<{rc:.5}> edges=<{edges}> delayed=<{delayed:?}>",
            line = self.line.0,
            cost = self.schedule_cost,
            rc = self.reduced_cost,
            edges = edges,
            delayed = self.delayed_coils().iter().map(|c| c.0).collect::<Vec<i32>>()
        )
    }
}
