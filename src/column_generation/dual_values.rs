use crate::column_generation::schedule::Schedule;
use crate::instance::{Coil, EdgeKey, Instance, ProductionLine};
use crate::misc::{FullHashMap, HashMap};

/// Dual prices (or farkas multipliers) of every master row, one snapshot per pricing round.
///
/// Read only while a round is in flight. Lookups of keys the master never
/// created are modelling bugs and panic.
#[derive(Clone, Debug, Default)]
pub struct DualValues {
    pub pi_partitioning: HashMap<Coil, f64>,
    pub pi_convexity: HashMap<ProductionLine, f64>,
    pub pi_max_delayed_coils: f64,
    pub pi_original_var_x: FullHashMap<EdgeKey, f64>,
    pub pi_original_var_z: HashMap<Coil, f64>,
}

impl DualValues {
    pub fn partitioning(&self, coil: Coil) -> f64 {
        match self.pi_partitioning.get(&coil) {
            Some(v) => *v,
            None => panic!("no partitioning dual for coil {coil}"),
        }
    }

    pub fn convexity(&self, line: ProductionLine) -> f64 {
        match self.pi_convexity.get(&line) {
            Some(v) => *v,
            None => panic!("no convexity dual for line {line}"),
        }
    }

    pub fn original_var_x(&self, edge: &EdgeKey) -> f64 {
        match self.pi_original_var_x.get(edge) {
            Some(v) => *v,
            None => panic!("no reconstruction dual for edge {edge}"),
        }
    }

    pub fn original_var_z(&self, coil: Coil) -> f64 {
        match self.pi_original_var_z.get(&coil) {
            Some(v) => *v,
            None => panic!("no reconstruction dual for coil {coil}"),
        }
    }

    /// Dual part of selecting `edge`.
    ///
    /// The edge's coefficient in its reconstruction row is -1, hence `+ pi_x`.
    /// Leaving a regular coil covers it, hence `- pi_part`.
    pub fn edge_dual_term(&self, instance: &Instance, edge: &EdgeKey) -> f64 {
        let partitioning = if instance.is_regular(edge.from) { self.partitioning(edge.from) } else { 0.0 };
        self.original_var_x(edge) - partitioning
    }

    /// Objective coefficient of an edge variable in the pricing problem
    pub fn edge_coefficient(&self, instance: &Instance, edge: &EdgeKey, is_farkas: bool) -> f64 {
        let cost = if is_farkas { 0.0 } else { instance.stringer_cost(edge) };
        cost + self.edge_dual_term(instance, edge)
    }

    /// Contribution of marking `coil` as delayed
    pub fn delay_coefficient(&self, coil: Coil) -> f64 {
        -self.pi_max_delayed_coils + self.original_var_z(coil)
    }

    /// Reduced cost of a column, computed from the column's incidence alone
    pub fn reduced_cost(&self, instance: &Instance, schedule: &Schedule, is_farkas: bool) -> f64 {
        let cost = if is_farkas { 0.0 } else { schedule.schedule_cost };
        let edges: f64 = schedule
            .selected_edges()
            .iter()
            .map(|e| self.edge_dual_term(instance, e))
            .sum();
        let delays: f64 = schedule.delayed_coils().into_iter().map(|c| self.delay_coefficient(c)).sum();
        cost + edges + delays - self.convexity(schedule.line)
    }
}
