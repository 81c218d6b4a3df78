use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::column_generation::column_pool::ColumnId;
use crate::column_generation::dual_values::DualValues;
use crate::column_generation::master::MasterProblem;
use crate::column_generation::schedule::Schedule;
use crate::column_generation::sub_problem::SubProblem;
use crate::column_generation::{MipModel, PricedModel, PricingCallbacks, PricingKind, PricingResult, PricingSettings};
use crate::instance::{Coil, EdgeKey, Instance, Mode, ProductionLine};
use crate::misc::cancellation::{CancellationToken, RoundSignal};
use crate::ui::{PricingRoundUIState, SubProblemUIState, UISender, UIUserMessage};

/// How a line's pricing loop ended within one round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Accepted(ColumnId),
    /// The dual bound proved that the line has no improving column
    Pruned,
    /// Gap ladder and fallback found nothing new
    Exhausted,
    /// Another line succeeded first
    Interrupted,
}

impl LineOutcome {
    pub fn column(&self) -> Option<ColumnId> {
        match self {
            LineOutcome::Accepted(id) => Some(*id),
            _ => None,
        }
    }
}

impl Display for LineOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LineOutcome::Accepted(id) => write!(f, "accepted lambda_L{}_{}", id.line.0, id.index),
            LineOutcome::Pruned => write!(f, "pruned by dual bound"),
            LineOutcome::Exhausted => write!(f, "no new column"),
            LineOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Read only context shared by all line workers of one round
struct RoundContext<'a, M: PricedModel> {
    master: &'a MasterProblem<M>,
    duals: &'a DualValues,
    settings: &'a PricingSettings,
    kind: PricingKind,
    ui: &'a UISender,
}

/// Pricing controller.
///
/// Invoked through [`PricingCallbacks`] by whatever loop drives the master.
/// Each round prices every line on its own thread and reports whether at
/// least one new column entered the master.
pub struct Pricer<M: PricedModel, S: MipModel> {
    master: Arc<MasterProblem<M>>,
    sub_problems: Vec<SubProblem<S>>,
    settings: PricingSettings,
    ui: UISender,
    iteration: usize,
    trivial_columns_seeded: bool,
}

impl<M: PricedModel, S: MipModel> Pricer<M, S> {
    pub fn new(master: Arc<MasterProblem<M>>, env: &mut S::Env, settings: PricingSettings, ui: UISender) -> Self {
        let instance = master.instance().clone();
        let sub_problems = instance
            .lines()
            .map(|line| SubProblem::new(instance.clone(), line, env, &settings))
            .collect();

        Pricer {
            master,
            sub_problems,
            settings,
            ui,
            iteration: 0,
            trivial_columns_seeded: false,
        }
    }

    pub fn master(&self) -> &Arc<MasterProblem<M>> {
        &self.master
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn sub_problem(&self, line: ProductionLine) -> &SubProblem<S> {
        &self.sub_problems[line.0 as usize]
    }

    pub fn trivial_columns_seeded(&self) -> bool {
        self.trivial_columns_seeded
    }

    /// Seeds one expensive artificial column per line, which makes the master feasible.
    /// Does nothing if already seeded.
    pub fn seed_trivial_columns(&mut self) -> Vec<ColumnId> {
        if self.trivial_columns_seeded {
            return Vec::new();
        }
        self.trivial_columns_seeded = true;

        let ids: Vec<ColumnId> = trivial_schedules(self.master.instance())
            .into_iter()
            .filter_map(|s| self.master.add_column_if_new(s))
            .collect();
        self.ui.send(UIUserMessage::Log(format!("seeded {} trivial columns", ids.len())));
        ids
    }

    /// One pricing round
    pub fn price(&mut self, kind: PricingKind) -> PricingResult {
        self.iteration += 1;
        let start = Instant::now();
        self.ui.send(UIUserMessage::PricingRoundStart { kind, iteration: self.iteration });

        let duals = self.master.get_dual_values(kind.is_farkas());

        // farkas rounds explore every line completely
        let stop_early = !kind.is_farkas() && self.settings.enable_subproblem_interruption;
        let cancel = CancellationToken::new();
        let signal = RoundSignal::new();
        let num_lines = self.sub_problems.len();

        let ctx = RoundContext {
            master: &self.master,
            duals: &duals,
            settings: &self.settings,
            kind,
            ui: &self.ui,
        };

        let outcomes: Vec<(ProductionLine, LineOutcome)> = thread::scope(|s| {
            let handles: Vec<_> = self
                .sub_problems
                .iter_mut()
                .map(|sub_problem| {
                    let ctx = &ctx;
                    let signal = &signal;
                    let token = if stop_early { cancel.clone() } else { CancellationToken::new() };
                    s.spawn(move || {
                        let guard = signal.guard();
                        sub_problem.attach_cancellation(token);
                        let outcome = price_line(sub_problem, ctx);
                        guard.finish(outcome.column().is_some());
                        (sub_problem.line(), outcome)
                    })
                })
                .collect();

            if signal.wait(num_lines, stop_early) && stop_early {
                cancel.cancel();
            }

            // interruption is advisory, always wait for every worker
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(outcome) => outcome,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        });

        let mut columns = Vec::new();
        for (line, outcome) in outcomes {
            self.ui.send(UIUserMessage::LineFinished { line, outcome: outcome.to_string() });
            if let Some(id) = outcome.column() {
                columns.push(id);
            }
        }

        self.ui.send(UIUserMessage::PricingRoundFinish(PricingRoundUIState {
            kind,
            iteration: self.iteration,
            found: columns.len(),
            runtime: start.elapsed().as_secs_f64(),
        }));

        if columns.is_empty() {
            PricingResult::NoColumns
        } else {
            PricingResult::FoundColumns(columns)
        }
    }
}

impl<M: PricedModel, S: MipModel> PricingCallbacks for Pricer<M, S> {
    fn on_reduced_cost_pricing_requested(&mut self) -> PricingResult {
        self.price(PricingKind::ReducedCost)
    }

    fn on_feasibility_pricing_requested(&mut self) -> PricingResult {
        if self.settings.generate_initial_trivial_column && !self.trivial_columns_seeded {
            let ids = self.seed_trivial_columns();
            if !ids.is_empty() {
                return PricingResult::FoundColumns(ids);
            }
        }
        self.price(PricingKind::Farkas)
    }
}

/// Solve once with the current settings and try to accept a candidate
fn attempt<M: PricedModel, S: MipModel>(sub_problem: &mut SubProblem<S>, ctx: &RoundContext<M>) -> Option<ColumnId> {
    let candidates = sub_problem.solve();

    ctx.ui.send(UIUserMessage::SubProblemSolved(SubProblemUIState {
        line: sub_problem.line(),
        gap: sub_problem.gap(),
        time_limit: sub_problem.time_limit(),
        num_candidates: candidates.iter().filter(|c| !c.is_empty()).count(),
        best_reduced_cost: candidates.first().filter(|c| !c.is_empty()).map(|c| c.reduced_cost),
        dual_bound: sub_problem.get_dual_bound(),
        runtime: sub_problem.last_runtime(),
        interrupted: sub_problem.was_interrupted(),
    }));

    accept_first_new(ctx, candidates)
}

/// Candidates are sorted, so the first non improving one ends the search
fn accept_first_new<M: PricedModel>(ctx: &RoundContext<M>, candidates: Vec<Schedule>) -> Option<ColumnId> {
    for candidate in candidates {
        if !candidate.reduced_cost_negative {
            break;
        }

        #[cfg(feature = "validity_assertions")]
        {
            let instance = ctx.master.instance();
            assert!(candidate.is_valid_path(instance), "invalid column {}", candidate);
            let analytic = ctx.duals.reduced_cost(instance, &candidate, ctx.kind.is_farkas());
            assert!(
                (analytic - candidate.reduced_cost).abs() < 1e-4 * (1.0 + analytic.abs()),
                "reduced cost mismatch {} vs {} for {}",
                analytic,
                candidate.reduced_cost,
                candidate
            );
        }

        if let Some(id) = ctx.master.add_column_if_new(candidate) {
            return Some(id);
        }
    }
    None
}

/// Per line pricing loop: initial attempt, dynamic gap ladder, exact fallback
fn price_line<M: PricedModel, S: MipModel>(sub_problem: &mut SubProblem<S>, ctx: &RoundContext<M>) -> LineOutcome {
    let settings = ctx.settings;
    sub_problem.update_objective(ctx.duals, ctx.kind.is_farkas());

    if settings.initial_solve_enabled {
        sub_problem.set_gap(settings.initial_solve_gap);
        sub_problem.set_time_limit(settings.initial_solve_time_limit);
        if let Some(id) = attempt(sub_problem, ctx) {
            return LineOutcome::Accepted(id);
        }
        if sub_problem.was_interrupted() {
            return LineOutcome::Interrupted;
        }
        if sub_problem.proves_no_column() {
            return LineOutcome::Pruned;
        }
        if settings.only_initial_solve {
            return LineOutcome::Exhausted;
        }
    }

    sub_problem.reset_dynamic_gap();
    sub_problem.reset_time_limit();
    for _ in 0..settings.dynamic_gap_max_rounds {
        if sub_problem.is_cancelled() {
            return LineOutcome::Interrupted;
        }

        let gap = sub_problem.dynamic_gap();
        sub_problem.set_gap(gap);
        if let Some(id) = attempt(sub_problem, ctx) {
            return LineOutcome::Accepted(id);
        }
        if sub_problem.was_interrupted() {
            return LineOutcome::Interrupted;
        }
        if sub_problem.proves_no_column() {
            return LineOutcome::Pruned;
        }

        // only duplicates or no improving incumbent at this gap
        let next_gap = gap / 2.0;
        if next_gap < settings.dynamic_gap_lower_bound {
            break;
        }
        sub_problem.set_dynamic_gap(next_gap);
    }

    if settings.fallback_exact_solve {
        if sub_problem.is_cancelled() {
            return LineOutcome::Interrupted;
        }
        sub_problem.set_gap(settings.nominal_gap);
        if let Some(id) = attempt(sub_problem, ctx) {
            return LineOutcome::Accepted(id);
        }
        if sub_problem.was_interrupted() {
            return LineOutcome::Interrupted;
        }
        if sub_problem.proves_no_column() {
            return LineOutcome::Pruned;
        }
    }

    LineOutcome::Exhausted
}

/// One artificial column per line that makes the master feasible.
///
/// Regular coils are dealt round robin over the lines that can process
/// them and chained in index order with their first enabled mode. A line
/// without coils gets an edgeless column. No coil is delayed and every
/// column costs more than any real solution. Seeds are flagged artificial,
/// a priced column with the same edges is still accepted.
pub fn trivial_schedules(instance: &Instance) -> Vec<Schedule> {
    let lines: Vec<ProductionLine> = instance.lines().collect();
    let mut assigned: Vec<Vec<(Coil, Mode)>> = vec![Vec::new(); lines.len()];

    let mut next = 0;
    for coil in instance.regular_coils() {
        let target = (0..lines.len())
            .map(|offset| (next + offset) % lines.len())
            .find(|l| !instance.modes(coil, lines[*l]).is_empty());
        if let Some(l) = target {
            assigned[l].push((coil, instance.modes(coil, lines[l])[0]));
            next = (l + 1) % lines.len();
        }
    }

    let cost = instance.cost_upper_bound();
    lines
        .iter()
        .zip(assigned)
        .map(|(&line, coils)| {
            let mut edges = Vec::new();
            if !coils.is_empty() {
                let mut previous = (instance.start_coil(), Mode(0));
                for &(coil, mode) in coils.iter().chain(std::iter::once(&(instance.end_coil(), Mode(0)))) {
                    edges.push(EdgeKey::new(previous.0, coil, line, previous.1, mode));
                    previous = (coil, mode);
                }
            }
            let mut schedule = Schedule::from_edges(instance, line, edges, std::iter::empty());
            schedule.schedule_cost = cost;
            schedule.artificial = true;
            schedule
        })
        .collect()
}
