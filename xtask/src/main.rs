// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//!
//! Build driver for the dcpmm crate: runs the unit and integration
//! tests over every supported feature combination.
//!
use clap;
use duct::cmd;
use std::env;
use std::process;

/// Whether we build in release or debug mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn new(matches: &clap::ArgMatches) -> BuildProfile {
        if matches.get_flag("release") {
            BuildProfile::Release
        } else {
            BuildProfile::Debug
        }
    }

    fn build_type(self) -> Option<&'static str> {
        match self {
            Self::Release => Some("--release"),
            Self::Debug => None,
        }
    }
}

/// Feature sets the library has to build with.
const FEATURE_SETS: [(&str, &str); 3] = [
    ("default", ""),
    ("no_std", "--no-default-features"),
    ("serde", "--features serde"),
];

/// Options shared by every cargo invocation.
#[derive(Clone, Debug)]
struct CargoArgs {
    profile: BuildProfile,
    locked: bool,
}

impl CargoArgs {
    fn new(matches: &clap::ArgMatches) -> CargoArgs {
        CargoArgs {
            profile: BuildProfile::new(matches),
            locked: matches.get_flag("locked"),
        }
    }

    /// Runs `cargo SUBCOMMAND` with the shared options and EXTRA.
    fn run(&self, subcommand: &str, extra: &str) {
        let build_type = self.profile.build_type().unwrap_or("");
        let locked = self.locked.then_some("--locked").unwrap_or("");
        let args = format!("{subcommand} {locked} {build_type} {extra}");
        println!("cargo {}", args.split_whitespace().collect::<Vec<_>>().join(" "));
        if let Err(e) = cmd(cargo(), args.split_whitespace()).run() {
            eprintln!("cargo {subcommand} failed: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    let matches = parse_args();
    match matches.subcommand() {
        Some(("build", m)) => build(&CargoArgs::new(m)),
        Some(("test", m)) => test(&CargoArgs::new(m)),
        Some(("clippy", m)) => clippy(&CargoArgs::new(m)),
        Some(("doc", m)) => CargoArgs::new(m).run("doc", "--no-deps"),
        Some(("clean", _m)) => clean(),
        _ => {
            println!("Unknown command");
            process::exit(1);
        }
    }
}

fn common_args() -> [clap::Arg; 3] {
    [
        clap::arg!(--locked "Build locked to Cargo.lock"),
        clap::arg!(--release "Build optimized version").conflicts_with("debug"),
        clap::arg!(--debug "Build debug version (default)")
            .conflicts_with("release"),
    ]
}

/// Parse program arguments and return the match structure.
fn parse_args() -> clap::ArgMatches {
    clap::Command::new("xtask")
        .version("0.1.0")
        .about("dcpmm build tool")
        .subcommand(
            clap::Command::new("build")
                .about("Builds every feature set")
                .args(common_args()),
        )
        .subcommand(
            clap::Command::new("test")
                .about("Runs unit and integration tests for every feature set")
                .args(common_args()),
        )
        .subcommand(
            clap::Command::new("clippy")
                .about("Runs cargo clippy for every feature set")
                .args(common_args()),
        )
        .subcommand(
            clap::Command::new("doc")
                .about("Builds the API documentation")
                .args(common_args()),
        )
        .subcommand(clap::Command::new("clean").about("cargo clean"))
        .get_matches()
}

fn build(args: &CargoArgs) {
    for (_, features) in FEATURE_SETS {
        args.run("build", features);
    }
}

/// Unit tests need std for the test harness; the `no_std` set is only
/// built.
fn test(args: &CargoArgs) {
    for (name, features) in FEATURE_SETS {
        if name == "no_std" {
            args.run("build", features);
        } else {
            args.run("test", &format!("{features} --lib --tests"));
        }
    }
}

fn clippy(args: &CargoArgs) {
    for (_, features) in FEATURE_SETS {
        args.run("clippy", &format!("{features} -- -D warnings"));
    }
}

fn clean() {
    if let Err(e) = cmd!(cargo(), "clean").run() {
        eprintln!("cargo clean failed: {e}");
        process::exit(1);
    }
}

/// Returns the value of the given environment variable,
/// or the default if unspecified.
fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or(default.into())
}

/// Returns the name of the cargo binary.
fn cargo() -> String {
    env_or("CARGO", "cargo")
}
