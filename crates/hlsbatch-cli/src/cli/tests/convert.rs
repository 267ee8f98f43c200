//! Tests for `convert`.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_convert_minimal() {
    match parse(&["hlsbatch", "convert", "movie.mp4"]) {
        CliCommand::Convert {
            inputs,
            output,
            segment,
            jobs,
            ffmpeg,
            report,
        } => {
            assert_eq!(inputs, vec![PathBuf::from("movie.mp4")]);
            assert!(output.is_none());
            assert!(segment.is_none());
            assert!(jobs.is_none());
            assert!(ffmpeg.is_none());
            assert!(report.is_none());
        }
        _ => panic!("expected Convert"),
    }
}

#[test]
fn cli_parse_convert_all_flags() {
    match parse(&[
        "hlsbatch",
        "convert",
        "a.mkv",
        "videos/",
        "-o",
        "/srv/hls",
        "--segment",
        "6",
        "-j",
        "3",
        "--ffmpeg",
        "/opt/ffmpeg/bin/ffmpeg",
        "--report",
        "batch.json",
    ]) {
        CliCommand::Convert {
            inputs,
            output,
            segment,
            jobs,
            ffmpeg,
            report,
        } => {
            assert_eq!(inputs, vec![PathBuf::from("a.mkv"), PathBuf::from("videos/")]);
            assert_eq!(output, Some(PathBuf::from("/srv/hls")));
            assert_eq!(segment, Some(6));
            assert_eq!(jobs, Some(3));
            assert_eq!(ffmpeg, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
            assert_eq!(report, Some(PathBuf::from("batch.json")));
        }
        _ => panic!("expected Convert with flags"),
    }
}

#[test]
fn cli_parse_convert_requires_input() {
    assert!(Cli::try_parse_from(["hlsbatch", "convert", "-o", "out"]).is_err());
}

#[test]
fn cli_parse_convert_rejects_bad_numbers() {
    assert!(Cli::try_parse_from(["hlsbatch", "convert", "a.mp4", "--jobs", "many"]).is_err());
    assert!(Cli::try_parse_from(["hlsbatch", "convert", "a.mp4", "--segment", "-2"]).is_err());
}
