use crate::cli::Cli;
use crate::commands::Commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use googletest::prelude::*;

#[test]
fn given_run_with_overrides_when_parsed_then_port_and_timeout_set() {
    let cli = Cli::try_parse_from(["svctl", "run", "--port", "9000", "--startup-timeout", "2m"])
        .unwrap();

    match cli.command {
        Commands::Run {
            port,
            startup_timeout,
        } => {
            assert_that!(port, some(eq(9000)));
            assert_that!(startup_timeout, some(eq(Duration::from_secs(120))));
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn given_reap_without_port_or_name_when_parsed_then_rejected() {
    let result = Cli::try_parse_from(["svctl", "reap"]);

    assert!(result.is_err());
}

#[test]
fn given_reap_by_name_when_parsed_then_default_grace_applies() {
    let cli = Cli::try_parse_from(["svctl", "reap", "--name", "open-webui serve"]).unwrap();

    match cli.command {
        Commands::Reap { port, name, grace } => {
            assert_that!(port, none());
            assert_eq!(name.as_deref(), Some("open-webui serve"));
            assert_that!(grace, eq(Duration::from_secs(2)));
        }
        other => panic!("expected reap, got {other:?}"),
    }
}

#[test]
fn given_bad_duration_when_parsed_then_rejected() {
    let result = Cli::try_parse_from(["svctl", "run", "--startup-timeout", "soon"]);

    assert!(result.is_err());
}

#[test]
fn given_global_flags_after_subcommand_when_parsed_then_accepted() {
    let cli = Cli::try_parse_from([
        "svctl",
        "probe",
        "--port",
        "8080",
        "--config-dir",
        "/tmp/sv",
        "--pretty",
    ])
    .unwrap();

    assert!(cli.pretty);
    assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/sv")));
    assert!(matches!(cli.command, Commands::Probe { port: 8080 }));
}
