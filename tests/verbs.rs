use std::path::PathBuf;
use std::sync::Arc;

use buildpipe::config::{ArgsSection, ConfigFile, RawConfigFile};
use buildpipe::engine::planner::argument_vector;
use buildpipe::engine::{InvocationPlanner, RunRequest};
use buildpipe::errors::BuildpipeError;
use buildpipe::types::{ArgKind, Verb};
use buildpipe_test_utils::FakeBackend;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn config_with_args(args: ArgsSection) -> Arc<ConfigFile> {
    let raw = RawConfigFile {
        args,
        ..Default::default()
    };
    Arc::new(ConfigFile::try_from(raw).expect("valid config"))
}

#[test]
fn verb_parsing_is_strict() {
    assert_eq!("check".parse::<Verb>().unwrap(), Verb::Check);
    assert_eq!("Clippy".parse::<Verb>().unwrap(), Verb::Lint);
    assert_eq!(
        "custom:expand".parse::<Verb>().unwrap(),
        Verb::Custom("expand".to_string())
    );

    assert!(matches!(
        "deploy".parse::<Verb>(),
        Err(BuildpipeError::UnhandledVerb(_))
    ));
    assert!(matches!(
        "custom:".parse::<Verb>(),
        Err(BuildpipeError::UnhandledVerb(_))
    ));
    assert!(matches!(
        "custom:--help".parse::<Verb>(),
        Err(BuildpipeError::UnhandledVerb(_))
    ));
}

#[test]
fn display_round_trips_through_from_str() {
    for verb in [
        Verb::Build,
        Verb::Check,
        Verb::Lint,
        Verb::Test,
        Verb::Run,
        Verb::Bench,
        Verb::Doc,
        Verb::Update,
        Verb::Clean,
        Verb::New,
        Verb::Init,
        Verb::Custom("expand".to_string()),
    ] {
        assert_eq!(verb.to_string().parse::<Verb>().unwrap(), verb);
    }
}

#[test]
fn rule_table_structured_output_and_arg_kinds() {
    for verb in [Verb::Build, Verb::Check, Verb::Lint, Verb::Test, Verb::Run] {
        assert!(verb.supports_structured_output(), "{verb} should be structured");
    }
    for verb in [
        Verb::Bench,
        Verb::Doc,
        Verb::Update,
        Verb::Clean,
        Verb::New,
        Verb::Init,
        Verb::Custom("expand".to_string()),
    ] {
        assert!(!verb.supports_structured_output(), "{verb} should be plain");
        assert_eq!(verb.rule().arg_kind, None);
    }

    assert_eq!(Verb::Lint.subcommand(), "clippy");
    assert_eq!(Verb::Lint.rule().arg_kind, Some(ArgKind::Lint));
    assert_eq!(Verb::Custom("expand".into()).subcommand(), "expand");
    assert!(Verb::Check.rule().probe.is_some());
    assert!(Verb::Build.rule().probe.is_none());
}

#[test]
fn argument_vector_puts_subcommand_first() {
    let argv = argument_vector(&Verb::Check, "check", &[], &strings(&["--lib"]));
    assert_eq!(argv, strings(&["check", "--message-format", "json", "--lib"]));

    let argv = argument_vector(&Verb::Doc, "doc", &[], &strings(&["--open"]));
    assert_eq!(argv, strings(&["doc", "--open"]));
}

#[test]
fn configured_args_come_before_request_args() {
    let argv = argument_vector(
        &Verb::Test,
        "test",
        &strings(&["--workspace"]),
        &strings(&["--", "--nocapture"]),
    );
    assert_eq!(
        argv,
        strings(&["test", "--message-format", "json", "--workspace", "--", "--nocapture"])
    );
}

#[tokio::test]
async fn planner_uses_config_args_for_the_verb_kind() {
    let config = config_with_args(ArgsSection {
        check: strings(&["--all-targets"]),
        test: strings(&["--release"]),
        ..Default::default()
    });
    let planner = InvocationPlanner::new("cargo", config);
    let backend = FakeBackend::manual();

    let invocation = planner
        .plan(
            &backend,
            &RunRequest::new(Verb::Check, strings(&["--lib"]), false),
            PathBuf::from("/work"),
        )
        .await;

    assert!(invocation.structured);
    assert_eq!(invocation.spec.program, "cargo");
    assert_eq!(invocation.spec.cwd, PathBuf::from("/work"));
    assert_eq!(
        invocation.spec.args,
        strings(&["check", "--message-format", "json", "--all-targets", "--lib"])
    );
}

#[tokio::test]
async fn failed_probe_selects_fallback_and_is_cached() {
    let planner = InvocationPlanner::new("cargo", Arc::new(ConfigFile::default()));
    let backend = FakeBackend::manual().with_probe(&["clippy", "--version"], false);
    let request = RunRequest::new(Verb::Lint, vec![], false);

    let first = planner.plan(&backend, &request, PathBuf::from("/w")).await;
    let second = planner.plan(&backend, &request, PathBuf::from("/w")).await;

    assert_eq!(first.spec.args, strings(&["check", "--message-format", "json"]));
    assert_eq!(second.spec.args, first.spec.args);
    assert_eq!(first.verb, Verb::Lint);

    let probes = backend.probes();
    assert_eq!(probes.len(), 1, "probe result should be cached");
    assert_eq!(probes[0].args, strings(&["clippy", "--version"]));
}

#[tokio::test]
async fn successful_probe_keeps_preferred_subcommand() {
    let planner = InvocationPlanner::new("cargo", Arc::new(ConfigFile::default()));
    let backend = FakeBackend::manual();

    let invocation = planner
        .plan(&backend, &RunRequest::new(Verb::Check, vec![], false), PathBuf::from("/w"))
        .await;

    assert_eq!(invocation.spec.args[0], "check");
    assert_eq!(backend.probes()[0].args, strings(&["check", "--help"]));
}

#[tokio::test]
async fn verbs_without_probe_never_probe() {
    let planner = InvocationPlanner::new("cargo", Arc::new(ConfigFile::default()));
    let backend = FakeBackend::manual();

    planner
        .plan(&backend, &RunRequest::new(Verb::Build, vec![], false), PathBuf::from("/w"))
        .await;
    let unprobed = planner.plan_unprobed(&RunRequest::new(Verb::Lint, vec![], false), PathBuf::from("/w"));

    assert!(backend.probes().is_empty());
    assert_eq!(unprobed.spec.args[0], "clippy");
}
