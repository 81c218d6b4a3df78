mod common;

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use coil_bnp::{CancellationToken, PricingSettings, ProductionLine, RoundSignal, SubProblem};

    use crate::common::{grid_instance, FakeEnv, ScriptedMip};

    #[test]
    fn token_clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn signal_waits_for_all_workers() {
        let signal = RoundSignal::new();
        let any = thread::scope(|s| {
            for k in 0..4 {
                let signal = &signal;
                s.spawn(move || {
                    thread::sleep(Duration::from_millis(k * 5));
                    signal.report(false);
                });
            }
            signal.wait(4, false)
        });
        assert!(!any);
        assert_eq!(signal.num_succeeded(), 0);
    }

    #[test]
    fn signal_returns_on_first_success() {
        let signal = RoundSignal::new();
        let blocker = CancellationToken::new();
        let any = thread::scope(|s| {
            let signal = &signal;
            let blocker_handle = blocker.clone();
            s.spawn(move || {
                // reports only after the controller returned
                while !blocker_handle.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                signal.report(false);
            });
            s.spawn(move || signal.report(true));

            let any = signal.wait(2, true);
            blocker.cancel();
            any
        });
        assert!(any);
        assert_eq!(signal.num_succeeded(), 1);
    }

    #[test]
    fn dropped_guard_reports_failure() {
        let signal = RoundSignal::new();
        let result = thread::scope(|s| {
            let signal = &signal;
            let handle = s.spawn(move || {
                let _guard = signal.guard();
                panic!("worker died");
            });
            let any = signal.wait(1, false);
            assert!(handle.join().is_err());
            any
        });
        assert!(!result);

        let guard = signal.guard();
        guard.finish(true);
        assert_eq!(signal.num_succeeded(), 1);
    }

    #[test]
    fn interrupt_solving_cancels_the_attached_token() {
        let instance = grid_instance(2, 1, 0);
        let mut sub_problem: SubProblem<ScriptedMip> =
            SubProblem::new(instance, ProductionLine(0), &mut FakeEnv::default(), &PricingSettings::default());

        let token = CancellationToken::new();
        sub_problem.attach_cancellation(token.clone());
        assert!(!sub_problem.is_cancelled());

        sub_problem.interrupt_solving();
        assert!(token.is_cancelled());
        assert!(sub_problem.is_cancelled());

        // a solve on a cancelled token never starts
        let candidates = sub_problem.solve();
        assert!(sub_problem.was_interrupted());
        assert!(!sub_problem.proves_no_column());
        assert!(candidates.len() == 1 && candidates[0].is_empty());
    }
}
