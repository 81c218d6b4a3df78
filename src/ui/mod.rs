use std::fmt::{Display, Formatter};

use std::io::Write;
use std::time::Instant;

use std::sync::mpsc::{channel, Sender};
use std::thread::ThreadId;
#[cfg(feature = "buffered_out")]
use std::io::BufWriter;

use console::{pad_str_with, Alignment, style, pad_str};

use crate::column_generation::PricingKind;
use crate::instance::ProductionLine;

/// Struct to hold the UI
/// Particulary the receiver channel
pub struct UI {
    sender: UISender,
}

#[derive(Clone)]
pub struct UISender {
    sender: Sender<UIMessage>,
}

// needed in stable rust, unstable auto detects
unsafe impl Send for UISender {}
unsafe impl Sync for UISender {}

impl UISender {
    /// Send typed UIMessage to internal channel
    pub fn send(&self, user_msg: UIUserMessage) {
        #[cfg(not(feature = "disable_ui"))]
        {
            // printer thread is gone after ExitUi, late messages are dropped
            let _ = self.sender.send(UIMessage {
                thread_id: std::thread::current().id(),
                message: user_msg,
            });
        }
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

impl UI {
    pub fn get_sender(&self) -> UISender {
        self.sender.clone()
    }

    pub fn new() -> Self {
        let (sender, receiver) = channel::<UIMessage>();

        #[cfg(not(feature = "disable_ui"))]
        std::thread::spawn(move || {
            #[cfg(not(feature = "locked_out"))]
            let stdout = std::io::stdout();
            #[cfg(feature = "locked_out")]
            let stdout = std::io::stdout().lock();

            #[cfg(not(feature = "buffered_out"))]
            let mut buffered_out = stdout;
            #[cfg(feature = "buffered_out")]
            let mut buffered_out = BufWriter::with_capacity(512, stdout);

            let start_time = Instant::now();

            let mut total_pricing_runtime = 0.0;
            let mut total_lp_runtime = 0.0;
            let mut total_columns = 0;

            // all senders dropped ends the loop as well
            while let Ok(UIMessage { thread_id, message }) = receiver.recv() {
                let time = start_time.elapsed().as_secs_f64();
                match message {
                    UIUserMessage::TimeLimitReached => writeln!(&mut buffered_out, "{}", style("Time Limit Reached").yellow().bold()).unwrap(),
                    UIUserMessage::Log(msg) => writeln!(&mut buffered_out, "[{:?}] {:>6.2}  {}", thread_id, time, msg).unwrap(),
                    UIUserMessage::LogS(msg) => writeln!(&mut buffered_out, "[{:?}] {:>6.2}  {}", thread_id, time, msg).unwrap(),

                    UIUserMessage::StartPhase(title) => {
                        writeln!(&mut buffered_out, "{}", pad_str_with(&format!("{:?}", thread_id), 30, Alignment::Center, None, '⎯')).unwrap();
                        writeln!(&mut buffered_out, "{}", style(pad_str(title, 30, Alignment::Center, None)).green()).unwrap();
                        writeln!(&mut buffered_out, "{}", "⎯".repeat(30)).unwrap();
                        buffered_out.flush().unwrap();
                    }

                    UIUserMessage::PricingRoundStart { kind, iteration } => {
                        writeln!(&mut buffered_out, "[{t:?}] {time:>6.2} started   pricing round {iteration} ({kind})", t = thread_id, time = time, iteration = iteration, kind = kind).unwrap();
                    }

                    UIUserMessage::SubProblemSolved(state) => {
                        /* noisy */
                        writeln!(&mut buffered_out, "{}", style(format!("[{t:?}] {time:>6.2} subproblem {state}", t = thread_id, time = time, state = state)).dim()).unwrap();
                    }

                    UIUserMessage::ColumnAdded(state) => {
                        total_columns += 1;
                        writeln!(&mut buffered_out, "[{t:?}] {time:>6.2} {tag} {state}", t = thread_id, time = time, tag = style("new column").green(), state = state).unwrap();
                    }

                    UIUserMessage::LineFinished { line, outcome } => {
                        writeln!(&mut buffered_out, "{}", style(format!("[{t:?}] {time:>6.2} line {line} {outcome}", t = thread_id, time = time, line = line, outcome = outcome)).dim()).unwrap();
                    }

                    UIUserMessage::PricingRoundFinish(state) => {
                        // always needed for statistics
                        total_pricing_runtime += state.runtime;

                        let line = format!("[{t:?}] {time:>6.2} completed pricing round {state}", t = thread_id, time = time, state = state);
                        if state.found > 0 {
                            writeln!(&mut buffered_out, "{}", line).unwrap();
                        } else {
                            writeln!(&mut buffered_out, "{}", style(line).yellow()).unwrap();
                        }
                        buffered_out.flush().unwrap();
                    }

                    UIUserMessage::LPSolveIterationFinish(state) => {
                        total_lp_runtime += state.lp_runtime;

                        writeln!(&mut buffered_out, "{}", style(format!("[{t:?}] {time:>6.2} lp iteration {state}", t = thread_id, time = time, state = state)).dim()).unwrap()
                    }

                    UIUserMessage::ExitUi => {
                        writeln!(&mut buffered_out, "{}", pad_str_with("Statistics", 30, Alignment::Center, None, '⎯')).unwrap();
                        writeln!(&mut buffered_out, "total_lp_time: {:>8.2}s / total_pricing_time: {:>8.2}s", total_lp_runtime, total_pricing_runtime).unwrap();
                        writeln!(&mut buffered_out, "columns added: {}", total_columns).unwrap();
                        if total_lp_runtime + total_pricing_runtime > 0.0 {
                            writeln!(&mut buffered_out, "{:>3.1}% spent in pricing vs lp", total_pricing_runtime / (total_lp_runtime + total_pricing_runtime) * 100.0).unwrap();
                        }
                        writeln!(&mut buffered_out, "{}", "⎯".repeat(30)).unwrap();

                        buffered_out.flush().unwrap();

                        break;
                    }
                }
            }

            buffered_out.flush().unwrap();
        });

        #[cfg(feature = "disable_ui")]
        drop(receiver);

        Self {
            sender: UISender { sender },
        }
    }
}

#[derive(Clone)]
/// Holds all state updates that can influence the UI
pub enum UIUserMessage {
    LogS(&'static str),
    Log(String),
    TimeLimitReached,
    StartPhase(&'static str),
    ExitUi,

    PricingRoundStart { kind: PricingKind, iteration: usize },
    SubProblemSolved(SubProblemUIState),
    ColumnAdded(ColumnUIState),
    LineFinished { line: ProductionLine, outcome: String },
    PricingRoundFinish(PricingRoundUIState),

    LPSolveIterationFinish(LPSolveIterationUIState),
}

#[derive(Clone)]
pub struct SubProblemUIState {
    pub line: ProductionLine,
    pub gap: f64,
    pub time_limit: f64,
    pub num_candidates: usize,
    pub best_reduced_cost: Option<f64>,
    pub dual_bound: f64,
    pub runtime: f64,
    pub interrupted: bool,
}

impl Display for SubProblemUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "L{line} gap=<{gap}> tl=<{tl}> candidates=<{num}> best_rc=<{rc}> bound=<{bound:.5}> runtime=<{runtime:>5.2}>{interrupted}",
            line = self.line.0,
            gap = self.gap,
            tl = self.time_limit,
            num = self.num_candidates,
            rc = self.best_reduced_cost.map(|rc| format!("{:.5}", rc)).unwrap_or_else(|| "-".to_string()),
            bound = self.dual_bound,
            runtime = self.runtime,
            interrupted = if self.interrupted { " interrupted" } else { "" }
        )
    }
}

#[derive(Clone)]
pub struct ColumnUIState {
    pub line: ProductionLine,
    pub lambda_index: u32,
    pub reduced_cost: f64,
    pub schedule_cost: f64,
    pub num_coils: usize,
    pub num_delayed: usize,
}

impl Display for ColumnUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lambda_L{}_{} rc=<{:.5}> cost=<{}> coils=<{}> delayed=<{}>",
            self.line.0, self.lambda_index, self.reduced_cost, self.schedule_cost, self.num_coils, self.num_delayed
        )
    }
}

#[derive(Clone)]
pub struct PricingRoundUIState {
    pub kind: PricingKind,
    pub iteration: usize,
    pub found: usize,
    pub runtime: f64,
}

impl Display for PricingRoundUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) pricing_runtime=<{:>5.2}> num_cols=<{}>", self.iteration, self.kind, self.runtime, self.found)
    }
}

#[derive(Clone)]
pub struct LPSolveIterationUIState {
    pub obj: Option<f64>,
    pub lp_runtime: f64,
    pub num_columns: usize,
    pub infeasible: bool,
}

impl Display for LPSolveIterationUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "obj=<{}> lp_runtime=<{:>5.2}> cols=<{}>{}",
            self.obj.map(|o| format!("{:>10.8}", o)).unwrap_or_else(|| "-".to_string()),
            self.lp_runtime,
            self.num_columns,
            if self.infeasible { " infeasible" } else { "" }
        )
    }
}

#[derive(Clone)]
pub struct UIMessage {
    pub thread_id: ThreadId,
    pub message: UIUserMessage,
}
