// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use yare::parameterized;

#[test]
fn parses_init_with_identifiers() {
    let cli = Cli::try_parse_from([
        "ssync", "--db", "/tmp/s.db", "init", "--aci", "aci-1", "--pni", "pni-1", "--linked", "3",
    ])
    .unwrap();

    assert_eq!(cli.db, Some(PathBuf::from("/tmp/s.db")));
    match cli.command {
        Command::Init {
            aci, pni, e164, linked,
        } => {
            assert_eq!(aci, "aci-1");
            assert_eq!(pni.as_deref(), Some("pni-1"));
            assert_eq!(e164, None);
            assert_eq!(linked, Some(3));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn global_flags_follow_subcommands() {
    let cli = Cli::try_parse_from(["ssync", "backup", "-v", "--config", "c.toml"]).unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    assert!(matches!(cli.command, Command::Backup));
}

#[test]
fn parses_contact_add() {
    let cli = Cli::try_parse_from([
        "ssync", "contact", "add", "--aci", "aci-b", "--given-name", "Bob",
    ])
    .unwrap();
    match cli.command {
        Command::Contact {
            command:
                ContactCommand::Add {
                    aci,
                    given_name,
                    family_name,
                },
        } => {
            assert_eq!(aci, "aci-b");
            assert_eq!(given_name.as_deref(), Some("Bob"));
            assert_eq!(family_name, None);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[parameterized(
    empty_aci = { &["ssync", "init", "--aci", ""] },
    blank_aci = { &["ssync", "init", "--aci", "  "] },
    missing_aci = { &["ssync", "contact", "add"] },
    unknown = { &["ssync", "sync"] },
)]
fn rejects_invalid_arguments(args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}
