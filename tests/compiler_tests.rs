// ABOUTME: Integration tests for the workflow compiler
// ABOUTME: Exercises wave planning, issue aggregation, and manifest stability

mod common;

use common::{TestStep, TestWorkflowBuilder};
use flotilla::compiler::CompileIssue;
use flotilla::CompileError;

fn diamond_yaml() -> String {
    TestWorkflowBuilder::new("diamond")
        .with_description("fan out and back in")
        .add_shell_step("fetch", "git clone repo")
        .add_dependent_step("lint", "run lint", vec!["fetch"])
        .add_dependent_step("scan", "run scan", vec!["fetch"])
        .add_dependent_step("report", "summarize", vec!["lint", "scan"])
        .generate_yaml()
}

#[test]
fn test_diamond_compiles_into_three_waves() {
    let compilation = flotilla::compile(&diamond_yaml()).unwrap();
    let manifest = &compilation.manifest;

    assert_eq!(manifest.waves.len(), 3);
    assert_eq!(manifest.waves[0], vec!["fetch"]);
    assert_eq!(manifest.waves[1], vec!["lint", "scan"]);
    assert_eq!(manifest.waves[2], vec!["report"]);
    assert_eq!(manifest.wave_of("report"), Some(2));
    assert_eq!(manifest.max_parallelism(), 2);
}

#[test]
fn test_repeated_compilation_yields_identical_manifests() {
    let yaml = diamond_yaml();
    let first = flotilla::compile(&yaml).unwrap();
    let second = flotilla::compile(&yaml).unwrap();
    assert_eq!(first.manifest, second.manifest);
}

#[test]
fn test_every_unknown_dependency_is_reported() {
    let yaml = TestWorkflowBuilder::new("ghosts")
        .add_dependent_step("a", "true", vec!["missing_one"])
        .add_dependent_step("b", "true", vec!["missing_two"])
        .generate_yaml();

    let error = flotilla::compile(&yaml).unwrap_err();
    let compile_error = error
        .downcast_ref::<CompileError>()
        .expect("expected a compile error");

    let unknown: Vec<_> = compile_error
        .issues
        .iter()
        .filter(|i| matches!(i, CompileIssue::UnknownDependency { .. }))
        .collect();
    assert_eq!(unknown.len(), 2);
}

#[test]
fn test_cycle_error_names_its_members() {
    let yaml = TestWorkflowBuilder::new("loop")
        .add_dependent_step("a", "true", vec!["b"])
        .add_dependent_step("b", "true", vec!["a"])
        .add_shell_step("c", "true")
        .generate_yaml();

    let error = flotilla::compile(&yaml).unwrap_err();
    let compile_error = error
        .downcast_ref::<CompileError>()
        .expect("expected a compile error");

    let cycle = compile_error
        .issues
        .iter()
        .find_map(|i| match i {
            CompileIssue::CyclicDependency { steps } => Some(steps),
            _ => None,
        })
        .expect("expected a cycle issue");
    assert!(cycle.contains(&"a".to_string()));
    assert!(cycle.contains(&"b".to_string()));
    assert!(!cycle.contains(&"c".to_string()));
}

#[test]
fn test_step_settings_survive_compilation() {
    let yaml = TestWorkflowBuilder::new("settings")
        .with_timeout("10m")
        .add_step(
            TestStep::shell("flaky", "curl upstream")
                .with_retry(3, "5s")
                .with_output("UPSTREAM")
                .tolerate_failure(),
        )
        .add_step(TestStep::shell("quick", "true").with_timeout("15s"))
        .generate_yaml();

    let manifest = flotilla::compile(&yaml).unwrap().manifest;

    let flaky = manifest.step("flaky").unwrap();
    assert_eq!(flaky.retry.limit, 3);
    assert_eq!(flaky.retry.interval, std::time::Duration::from_secs(5));
    assert_eq!(flaky.output.as_deref(), Some("UPSTREAM"));
    assert!(flaky.continue_on_failure);
    // Workflow-level timeout is inherited when the step sets none.
    assert_eq!(flaky.timeout, std::time::Duration::from_secs(600));

    let quick = manifest.step("quick").unwrap();
    assert_eq!(quick.timeout, std::time::Duration::from_secs(15));
    assert!(!quick.continue_on_failure);
}

#[test]
fn test_manifest_serializes_with_waves() {
    let manifest = flotilla::compile(&diamond_yaml()).unwrap().manifest;
    let json = manifest.to_json().unwrap();

    assert_eq!(json["workflow"], "diamond");
    assert_eq!(json["waves"][1][0], "lint");
    assert_eq!(json["steps"]["fetch"]["executor"]["kind"], "shell");
}
