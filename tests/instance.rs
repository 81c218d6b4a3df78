mod common;

#[cfg(test)]
mod tests {
    use coil_bnp::{Coil, EdgeKey, Instance, InstanceError, Mode, ProductionLine};

    use crate::common::{edge, TWO_COILS};

    #[test]
    fn parses_headers_and_records() {
        let instance = Instance::parse(TWO_COILS).unwrap();

        assert_eq!(instance.number_of_coils(), 2);
        assert_eq!(instance.number_of_lines(), 1);
        assert_eq!(instance.number_of_modes(), 1);
        assert_eq!(instance.maximum_delayed_coils(), 0);
        assert_eq!(instance.comments(), &["two coils on one line".to_string()]);

        assert_eq!(instance.start_coil(), Coil(-1));
        assert_eq!(instance.end_coil(), Coil(2));
        assert_eq!(instance.due_date(Coil(1)), 1000.0);
        assert_eq!(instance.processing_time(Coil(0), ProductionLine(0), Mode(0)), 1.0);
        assert_eq!(instance.stringer_cost(&edge(0, 1, 0)), 5.0);
        assert_eq!(instance.stringer_cost(&edge(1, 0, 0)), 10.0);
        assert_eq!(instance.modes(Coil(0), ProductionLine(0)), &[Mode(0)]);
    }

    #[test]
    fn headers_may_follow_records() {
        let text = "
d 0 7
m 0 0 1 1
I 1
K 1
M 2
a 1
";
        let instance = Instance::parse(text).unwrap();
        assert_eq!(instance.due_date(Coil(0)), 7.0);
        assert_eq!(instance.modes(Coil(0), ProductionLine(0)), &[Mode(1)]);
    }

    #[test]
    fn missing_data_defaults_to_zero() {
        let instance = Instance::parse(TWO_COILS).unwrap();
        assert_eq!(instance.setup_time(&edge(0, 1, 0)), 0.0);
        assert_eq!(instance.processing_time(Coil(0), ProductionLine(0), Mode(0)), 1.0);
        assert_eq!(instance.processing_time(Coil(-1), ProductionLine(0), Mode(0)), 0.0);
    }

    #[test]
    fn sentinels_run_in_mode_zero() {
        let instance = Instance::parse(TWO_COILS).unwrap();
        assert_eq!(instance.modes(instance.start_coil(), ProductionLine(0)), &[Mode(0)]);
        assert_eq!(instance.modes(instance.end_coil(), ProductionLine(0)), &[Mode(0)]);
    }

    #[test]
    fn edges_exclude_self_loops_and_empty_paths() {
        let instance = Instance::parse(TWO_COILS).unwrap();
        let edges = instance.edges(ProductionLine(0));

        // start -> {0, 1}, 0 -> {1, end}, 1 -> {0, end}
        assert_eq!(edges.len(), 6);
        assert!(edges.iter().all(|e| e.from != e.to));
        assert!(!edges.contains(&edge(-1, 2, 0)));
        assert!(edges.iter().all(|e| !instance.is_end(e.from) && !instance.is_start(e.to)));
    }

    #[test]
    fn edges_follow_enabled_modes() {
        let mut instance = Instance::new(2, 2, 2, 0);
        instance.enable_mode(Coil(0), ProductionLine(0), Mode(0));
        instance.enable_mode(Coil(0), ProductionLine(0), Mode(1));
        instance.enable_mode(Coil(1), ProductionLine(1), Mode(1));

        let line0 = instance.edges(ProductionLine(0));
        // start -> 0 (2 modes), 0 -> end (2 modes); coil 1 is not processed on line 0
        assert_eq!(line0.len(), 4);
        assert!(line0.contains(&EdgeKey::new(Coil(0), Coil(2), ProductionLine(0), Mode(1), Mode(0))));

        let line1 = instance.edges(ProductionLine(1));
        assert_eq!(line1.len(), 2);
        assert!(line1.iter().all(|e| e.from == Coil(1) || e.to == Coil(1)));
    }

    #[test]
    fn big_m_bounds_any_completion_time() {
        let mut instance = Instance::new(2, 1, 1, 0);
        for coil in [Coil(0), Coil(1)] {
            instance.enable_mode(coil, ProductionLine(0), Mode(0));
            instance.set_processing_time(coil, ProductionLine(0), Mode(0), 3.0);
        }
        instance.set_due_date(Coil(0), 4.0);
        instance.set_due_date(Coil(1), 9.0);
        instance.set_setup_time(edge(0, 1, 0), 2.0);

        // (3 + 2) + (3 + 0) + 9
        assert_eq!(instance.big_m(ProductionLine(0)), 17.0);
    }

    #[test]
    fn cost_upper_bound_exceeds_all_costs() {
        let instance = Instance::parse(TWO_COILS).unwrap();
        assert_eq!(instance.cost_upper_bound(), 36.0);
    }

    #[test]
    fn missing_header_is_reported() {
        let text = "I 1\nK 1\na 0\nd 0 1\n";
        assert!(matches!(Instance::parse(text), Err(InstanceError::MissingHeader('M'))));
    }

    #[test]
    fn missing_due_date_is_reported() {
        let text = "I 2\nK 1\nM 1\na 0\nd 0 5\n";
        assert!(matches!(Instance::parse(text), Err(InstanceError::MissingDueDate(Coil(1)))));
    }

    #[test]
    fn out_of_range_references_are_rejected() {
        let base = "I 1\nK 1\nM 1\na 0\nd 0 5\n";
        assert!(matches!(
            Instance::parse(&format!("{base}p 3 0 0 1\n")),
            Err(InstanceError::UnknownCoil { line: 6, coil: 3 })
        ));
        assert!(matches!(
            Instance::parse(&format!("{base}m 0 4 0 1\n")),
            Err(InstanceError::UnknownLine { line: 6, production_line: 4 })
        ));
        assert!(matches!(
            Instance::parse(&format!("{base}m 0 0 2 1\n")),
            Err(InstanceError::UnknownMode { line: 6, mode: 2 })
        ));
        // sentinels have no due date
        assert!(matches!(Instance::parse(&format!("{base}d -1 5\n")), Err(InstanceError::UnknownCoil { .. })));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let text = "I two\n";
        match Instance::parse(text) {
            Err(InstanceError::Malformed { line, reason }) => {
                assert_eq!(line, 1);
                assert!(reason.contains("two"));
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }

        let text = "I 1\nK 1\nM 1\na 0\nd 0\n";
        assert!(matches!(Instance::parse(text), Err(InstanceError::Malformed { line: 5, .. })));
    }

    #[test]
    fn disabled_modes_are_ignored() {
        let text = "I 1\nK 1\nM 2\na 0\nd 0 5\nm 0 0 0 0\nm 0 0 1 1\n";
        let instance = Instance::parse(text).unwrap();
        assert_eq!(instance.modes(Coil(0), ProductionLine(0)), &[Mode(1)]);
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        assert!(matches!(
            Instance::read("/nonexistent/instance.txt"),
            Err(InstanceError::Io(_))
        ));
    }
}
