use std::time::Instant;

use crate::column_generation::column_pool::ColumnId;
use crate::column_generation::pricer::Pricer;
use crate::column_generation::schedule::Schedule;
use crate::column_generation::{DriverSettings, MipModel, PricedModel, PricingCallbacks, PricingResult, SolveStatus, INT_FEAS_TOL};
use crate::misc::cancellation::CancellationToken;
use crate::ui::UIUserMessage;

/// Results of a root node column generation
pub struct ColGenResult {
    pub obj: f64,
    pub column_x: Vec<(f64, ColumnId)>,
    /// Per line schedules, only if the final relaxation is integral
    pub schedules: Option<Vec<Schedule>>,
    pub infeasible: bool,
    pub time_limit_reached: bool,
    pub iterations: usize,
}

/// Root node LP loop for engines without a pricer plugin mechanism.
///
/// Plays the host's role: solve the restricted master, then call the
/// farkas or reduced cost entry point depending on the outcome, until an
/// entry point reports no column.
pub fn run_column_generation<M: PricedModel, S: MipModel>(pricer: &mut Pricer<M, S>, settings: &DriverSettings) -> ColGenResult {
    let master = pricer.master().clone();
    let ui = master.ui().clone();
    ui.send(UIUserMessage::StartPhase("Column Generation"));

    if pricer.settings().generate_initial_trivial_column {
        pricer.seed_trivial_columns();
    }
    master.set_time_limit(settings.master_time_limit);

    let start = Instant::now();
    let never = CancellationToken::new();
    let mut iterations = 0;
    let mut infeasible = false;
    let mut time_limit_reached = false;
    let mut obj = f64::INFINITY;

    loop {
        if let Some(tl) = settings.time_limit {
            if start.elapsed() > tl {
                ui.send(UIUserMessage::TimeLimitReached);
                time_limit_reached = true;
                break;
            }
        }
        if iterations >= settings.max_iterations {
            ui.send(UIUserMessage::LogS("iteration limit reached"));
            break;
        }
        iterations += 1;

        let result = master.solve(&never);
        match result.status {
            SolveStatus::Infeasible => {
                if let PricingResult::NoColumns = pricer.on_feasibility_pricing_requested() {
                    infeasible = true;
                    break;
                }
            }
            SolveStatus::Optimal => {
                obj = result.obj.unwrap_or(f64::INFINITY);
                if let PricingResult::NoColumns = pricer.on_reduced_cost_pricing_requested() {
                    break;
                }
            }
            status => {
                ui.send(UIUserMessage::Log(format!("master solve ended with {:?}", status)));
                time_limit_reached = matches!(status, SolveStatus::TimeLimit);
                break;
            }
        }
    }

    let column_x: Vec<(f64, ColumnId)> = if infeasible {
        Vec::new()
    } else {
        master.lambda_values().into_iter().filter(|(v, _)| *v > INT_FEAS_TOL).collect()
    };

    let integral = !infeasible && !column_x.is_empty() && column_x.iter().all(|(v, _)| (v - v.round()).abs() < INT_FEAS_TOL);
    let schedules = if integral {
        Some(if settings.reconstruct_schedule_from_solution {
            master.reconstruct_from_lambdas()
        } else {
            master.reconstruct_from_original_vars()
        })
    } else {
        None
    };
    ui.send(UIUserMessage::ExitUi);

    ColGenResult {
        obj: if infeasible { f64::INFINITY } else { obj },
        column_x,
        schedules,
        infeasible,
        time_limit_reached,
        iterations,
    }
}
