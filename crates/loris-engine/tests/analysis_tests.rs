mod common;

use common::{and_of, assert_close, cold_spare, fdep_fanout, gate_of, racing_pand};
use loris_dft::model::GateKind;
use loris_dft::properties::Property;
use loris_dft::relevance::compute_relevant_events;
use loris_dft::transform::{transform, TransformOptions};
use loris_dft::wellformed::is_well_formed;
use loris_engine::pipeline::{analyze, build_model, AnalysisOptions, PipelineError};

fn exact_options() -> AnalysisOptions {
    AnalysisOptions {
        symmetry_reduction: false,
        ..AnalysisOptions::default()
    }
}

#[test]
fn and_of_two_has_four_states_five_transitions_and_mttf_three_halves() {
    let dft = and_of(2);
    let (ctmc, stats) = build_model(&dft, None, &exact_options()).unwrap();
    assert_eq!(ctmc.state_count(), 4);
    assert_eq!(ctmc.transition_count(), 5);
    assert_eq!(stats.states, 4);

    let results = analyze(
        &dft,
        &[Property::tree_mttf(), Property::tree_failure_probability()],
        None,
        &exact_options(),
    )
    .unwrap();
    assert_close(results[0], 1.5);
    assert_close(results[1], 1.0);
}

#[test]
fn reachability_and_its_negation_are_complementary() {
    // A PAND fails only when its children fail in order, so the tree
    // reaches "failed" with probability one half.
    let dft = gate_of(GateKind::Pand, 2, 1.0);
    let results = analyze(
        &dft,
        &[
            Property::tree_failure_probability(),
            Property::NeverFails {
                label: "failed".into(),
            },
        ],
        None,
        &exact_options(),
    )
    .unwrap();
    assert_close(results[0], 0.5);
    assert_close(results[1], 0.5);
    assert_close(results[0] + results[1], 1.0);
}

#[test]
fn pand_that_can_failsafe_has_infinite_mttf() {
    let dft = gate_of(GateKind::Pand, 2, 1.0);
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_eq!(results[0], f64::INFINITY);
}

#[test]
fn vote_two_of_three_mttf_is_the_second_order_statistic() {
    let dft = gate_of(GateKind::Vote { threshold: 2 }, 3, 1.0);
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_close(results[0], 1.0 / 3.0 + 1.0 / 2.0);
}

#[test]
fn cold_spare_mttf_adds_both_lifetimes() {
    let dft = cold_spare();
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_close(results[0], 2.0);
}

#[test]
fn dependency_cascade_shortens_the_mttf() {
    // Either both events fail on their own, or the trigger takes the
    // whole system down at once.
    let dft = fdep_fanout();
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_close(results[0], 2.0 / 3.0);
}

#[test]
fn symmetry_reduction_shrinks_states_but_not_measures() {
    for dft in [
        and_of(3),
        gate_of(GateKind::Or, 4, 0.5),
        gate_of(GateKind::Vote { threshold: 2 }, 3, 2.0),
    ] {
        let mut with_symmetry = exact_options();
        with_symmetry.symmetry_reduction = true;

        let (plain, _) = build_model(&dft, None, &exact_options()).unwrap();
        let (reduced, _) = build_model(&dft, None, &with_symmetry).unwrap();
        assert!(
            reduced.state_count() < plain.state_count(),
            "expected reduction on {}",
            dft.name(dft.top())
        );

        let properties = [Property::tree_mttf(), Property::tree_failure_probability()];
        let a = analyze(&dft, &properties, None, &exact_options()).unwrap();
        let b = analyze(&dft, &properties, None, &with_symmetry).unwrap();
        assert_close(a[0], b[0]);
        assert_close(a[1], b[1]);
    }
}

#[test]
fn relevant_events_pruning_never_changes_measures() {
    let properties = [Property::tree_mttf(), Property::tree_failure_probability()];
    for dft in [and_of(3), gate_of(GateKind::Or, 3, 1.0), fdep_fanout()] {
        let computed = compute_relevant_events(&dft, &properties, &[]).unwrap();
        let pruned = analyze(&dft, &properties, Some(computed), &exact_options()).unwrap();
        let full = analyze(&dft, &properties, None, &exact_options()).unwrap();
        assert_close(pruned[0], full[0]);
        assert_close(pruned[1], full[1]);
    }
}

#[test]
fn relevant_events_pruning_shrinks_the_chain() {
    let dft = gate_of(GateKind::Or, 3, 1.0);
    let computed =
        compute_relevant_events(&dft, &[Property::tree_failure_probability()], &[]).unwrap();
    let (pruned, _) = build_model(&dft, Some(computed), &exact_options()).unwrap();
    let (full, _) = build_model(&dft, None, &exact_options()).unwrap();
    assert!(pruned.state_count() < full.state_count());
}

#[test]
fn binary_fdeps_repairs_well_formedness_and_preserves_results() {
    let dft = fdep_fanout();
    let before = is_well_formed(&dft);
    assert!(!before.ok);
    assert!(before.diagnostic.contains("not binary"));

    let once = transform(&dft, &TransformOptions::default()).unwrap();
    assert!(is_well_formed(&once).ok);
    let twice = transform(&once, &TransformOptions::default()).unwrap();
    assert!(is_well_formed(&twice).ok);

    let properties = [Property::tree_mttf(), Property::tree_failure_probability()];
    let from_once = analyze(&once, &properties, None, &exact_options()).unwrap();
    let from_twice = analyze(&twice, &properties, None, &exact_options()).unwrap();
    assert_close(from_once[0], from_twice[0]);
    assert_close(from_once[1], from_twice[1]);
}

#[test]
fn properties_outside_the_relevant_set_are_rejected() {
    let dft = and_of(2);
    let relevant = compute_relevant_events(&dft, &[], &["be0".to_string()]).unwrap();
    let err = analyze(
        &dft,
        &[Property::tree_failure_probability()],
        Some(relevant),
        &exact_options(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Property(_)));
}

#[test]
fn conflict_checking_refuses_order_dependent_trees() {
    let mut options = exact_options();
    options.check_conflicts = true;
    let err = analyze(
        &racing_pand(),
        &[Property::tree_failure_probability()],
        None,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Conflict(_)));
}

#[test]
fn conflict_checking_passes_confluent_trees() {
    let mut options = exact_options();
    options.check_conflicts = true;
    let results = analyze(&fdep_fanout(), &[Property::tree_mttf()], None, &options).unwrap();
    assert_close(results[0], 2.0 / 3.0);
}

#[test]
fn parsed_models_analyze_end_to_end() {
    let galileo = "toplevel System;\nSystem and A B;\nA lambda=1.0;\nB lambda=1.0;\n";
    let dft = loris_formats::parse(galileo).unwrap();
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_close(results[0], 1.5);

    let json = r#"{
        "toplevel": "System",
        "elements": [
            { "type": "be", "name": "A", "rate": 1.0 },
            { "type": "be", "name": "B", "rate": 1.0 },
            { "type": "and", "name": "System", "children": ["A", "B"] }
        ]
    }"#;
    let dft = loris_formats::parse(json).unwrap();
    let results = analyze(&dft, &[Property::tree_mttf()], None, &exact_options()).unwrap();
    assert_close(results[0], 1.5);
}
