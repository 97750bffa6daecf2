use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use tickdag::config::{
    load_and_validate, load_workflow, parse_datetime, parse_dependency_chain, parse_workflow_str,
    TaskBody,
};
use tickdag::errors::{DefinitionError, TickdagError};
use tickdag::exec::{CallableRegistry, Runnable};
use tickdag::schedule::Cadence;
use tickdag::types::BackoffStrategy;
use tickdag_test_utils::utc_date;

const HELLO_WORLD: &str = r#"
[workflow]
id = "hello_world_dag"
description = "A simple hello world DAG"
schedule = "@daily"
start_date = "2024-01-01"
catchup = false
tags = ["example", "hello_world"]
dependencies = ["hello_python >> hello_bash"]

[default]
owner = "airflow"
email_on_failure = false
retries = 1
retry_delay = "5m"

[[task]]
id = "hello_python"
callable = "print_hello"

[[task]]
id = "hello_bash"
cmd = 'echo "Hello World from Bash!"'
"#;

fn registry() -> CallableRegistry {
    let mut registry = CallableRegistry::new();
    registry.register("print_hello", |_ctx| Ok(()));
    registry
}

fn config_error(result: tickdag::Result<impl std::fmt::Debug>) -> String {
    match result {
        Err(TickdagError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn hello_world_loads_into_a_two_task_chain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hello.toml");
    fs::write(&path, HELLO_WORLD).unwrap();

    let wf = load_workflow(&path, &registry()).unwrap();

    assert_eq!(wf.id(), "hello_world_dag");
    assert_eq!(wf.description(), Some("A simple hello world DAG"));
    assert_eq!(wf.cadence(), Cadence::days(1));
    assert_eq!(wf.start_date(), utc_date(2024, 1, 1));
    assert!(!wf.catchup());
    assert!(wf.tags().contains("hello_world"));
    assert_eq!(wf.graph().topological_order(), vec!["hello_python", "hello_bash"]);
    assert_eq!(wf.graph().upstream_of("hello_bash"), vec!["hello_python"]);

    for task in wf.tasks() {
        assert_eq!(task.retry.max_retries, 1);
        assert_eq!(task.retry.retry_delay, Duration::from_secs(300));
        assert_eq!(task.owner.as_deref(), Some("airflow"));
    }
    assert!(matches!(wf.task("hello_python").unwrap().runnable, Runnable::Callable(_)));
    assert!(matches!(wf.task("hello_bash").unwrap().runnable, Runnable::Shell(_)));
}

#[test]
fn validated_file_keeps_declaration_order_and_overrides() {
    let file = parse_workflow_str(
        r#"
        [workflow]
        id = "etl"
        schedule = "6h"
        start_date = "2024-03-01T06:00:00Z"
        end_date = "2024-04-01"

        [default]
        retries = 2
        backoff = "exponential"
        max_retry_delay = "1h"

        [[task]]
        id = "zeta"
        cmd = "extract.sh"
        env = { TARGET = "prod" }

        [[task]]
        id = "alpha"
        cmd = "load.sh"
        upstream = ["zeta"]
        retries = 0
        execution_timeout = "30s"
        "#,
    )
    .unwrap();

    assert_eq!(file.cadence, Cadence::hours(6));
    assert_eq!(file.end_date, Some(utc_date(2024, 4, 1)));
    assert_eq!(file.defaults.backoff, BackoffStrategy::Exponential);
    assert_eq!(file.defaults.max_retry_delay, Some(Duration::from_secs(3600)));
    assert_eq!(
        file.tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        vec!["zeta", "alpha"]
    );
    match &file.tasks[0].body {
        TaskBody::Shell(cmd) => assert_eq!(cmd.env.get("TARGET").map(String::as_str), Some("prod")),
        other => panic!("unexpected body {other:?}"),
    }

    let wf = file.into_workflow(&CallableRegistry::new()).unwrap();
    let alpha = wf.task("alpha").unwrap();
    assert_eq!(alpha.retry.max_retries, 0);
    assert_eq!(alpha.retry.backoff, BackoffStrategy::Exponential);
    assert_eq!(alpha.execution_timeout, Some(Duration::from_secs(30)));
    assert_eq!(wf.task("zeta").unwrap().retry.max_retries, 2);
    assert_eq!(wf.tasks().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["zeta", "alpha"]);
}

#[test]
fn task_needs_exactly_one_body() {
    let both = r#"
        [workflow]
        id = "wf"
        schedule = "@hourly"
        start_date = "2024-01-01"

        [[task]]
        id = "a"
        cmd = "true"
        callable = "f"
    "#;
    assert!(config_error(parse_workflow_str(both)).contains("both"));

    let neither = r#"
        [workflow]
        id = "wf"
        schedule = "@hourly"
        start_date = "2024-01-01"

        [[task]]
        id = "a"
    "#;
    assert!(config_error(parse_workflow_str(neither)).contains("either"));
}

#[test]
fn invalid_values_are_config_errors() {
    let base = |workflow_extra: &str, task_extra: &str| {
        format!(
            "[workflow]\nid = \"wf\"\n{workflow_extra}\n\n[[task]]\nid = \"a\"\ncmd = \"true\"\n{task_extra}\n"
        )
    };

    let cases = [
        base("schedule = \"@monthly\"\nstart_date = \"2024-01-01\"", ""),
        base("schedule = \"@daily\"\nstart_date = \"yesterday\"", ""),
        base(
            "schedule = \"@daily\"\nstart_date = \"2024-01-02\"\nend_date = \"2024-01-01\"",
            "",
        ),
        base(
            "schedule = \"@daily\"\nstart_date = \"2024-01-01\"\nmax_concurrent_tasks = 0",
            "",
        ),
        base("schedule = \"@daily\"\nstart_date = \"2024-01-01\"", "retry_delay = \"soon\""),
        base(
            "schedule = \"@daily\"\nstart_date = \"2024-01-01\"\ndependencies = [\"a >>\"]",
            "",
        ),
    ];

    for case in cases {
        let msg = config_error(parse_workflow_str(&case));
        assert!(!msg.is_empty());
    }
}

#[test]
fn workflow_without_tasks_is_rejected() {
    let toml = r#"
        [workflow]
        id = "empty"
        schedule = "@daily"
        start_date = "2024-01-01"
    "#;
    assert!(config_error(parse_workflow_str(toml)).contains("at least one"));
}

#[test]
fn graph_errors_surface_when_building() {
    let cyclic = parse_workflow_str(
        r#"
        [workflow]
        id = "wf"
        schedule = "@daily"
        start_date = "2024-01-01"
        dependencies = ["a >> b", "b >> a"]

        [[task]]
        id = "a"
        cmd = "true"

        [[task]]
        id = "b"
        cmd = "true"
        "#,
    )
    .unwrap();
    let err = cyclic.into_workflow(&CallableRegistry::new()).unwrap_err();
    assert!(matches!(
        err,
        TickdagError::Definition(DefinitionError::Cycle { .. })
    ));

    let unknown = parse_workflow_str(
        r#"
        [workflow]
        id = "wf"
        schedule = "@daily"
        start_date = "2024-01-01"

        [[task]]
        id = "a"
        cmd = "true"
        upstream = ["ghost"]
        "#,
    )
    .unwrap();
    let err = unknown.into_workflow(&CallableRegistry::new()).unwrap_err();
    assert!(matches!(
        err,
        TickdagError::Definition(DefinitionError::UnknownTask(ref name)) if name == "ghost"
    ));
}

#[test]
fn unregistered_callable_is_a_config_error() {
    let file = parse_workflow_str(HELLO_WORLD).unwrap();
    let msg = config_error(file.into_workflow(&CallableRegistry::new()));
    assert!(msg.contains("print_hello"));
}

#[test]
fn missing_file_and_bad_toml_have_their_own_errors() {
    let dir = tempdir().unwrap();

    let missing = load_and_validate(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(TickdagError::IoError(_))));

    let path = dir.path().join("broken.toml");
    fs::write(&path, "[workflow\nid = ").unwrap();
    assert!(matches!(load_and_validate(&path), Err(TickdagError::TomlError(_))));
}

#[test]
fn dependency_chains_and_dates_parse() {
    assert_eq!(
        parse_dependency_chain("a >> b>>c").unwrap(),
        vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string())
        ]
    );
    assert!(parse_dependency_chain("a").is_err());
    assert!(parse_dependency_chain("a >> >> c").is_err());

    assert_eq!(parse_datetime("2024-01-01").unwrap(), utc_date(2024, 1, 1));
    assert_eq!(
        parse_datetime("2024-01-01T02:00:00+02:00").unwrap(),
        utc_date(2024, 1, 1)
    );
    assert_eq!(
        parse_datetime("2024-01-01T00:00:00").unwrap(),
        utc_date(2024, 1, 1)
    );
    assert!(parse_datetime("01/01/2024").is_err());
}
