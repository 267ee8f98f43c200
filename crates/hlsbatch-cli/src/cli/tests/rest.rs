//! Tests for check and stop.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_check() {
    match parse(&["hlsbatch", "check"]) {
        CliCommand::Check { ffmpeg } => assert!(ffmpeg.is_none()),
        _ => panic!("expected Check"),
    }
}

#[test]
fn cli_parse_check_with_path() {
    match parse(&["hlsbatch", "check", "--ffmpeg", "./ffmpeg"]) {
        CliCommand::Check { ffmpeg } => assert_eq!(ffmpeg, Some(PathBuf::from("./ffmpeg"))),
        _ => panic!("expected Check with --ffmpeg"),
    }
}

#[test]
fn cli_parse_stop() {
    match parse(&["hlsbatch", "stop"]) {
        CliCommand::Stop => {}
        _ => panic!("expected Stop"),
    }
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["hlsbatch", "pause", "1"]).is_err());
}
