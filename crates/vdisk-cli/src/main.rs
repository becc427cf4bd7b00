//! The `vdisk` shell: executes command scripts or an interactive REPL
//! against virtual disk images.

mod parser;
mod shell;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use shell::{Outcome, Shell};

#[derive(Debug, Parser)]
#[command(name = "vdisk", version, about = "Simulated disk and filesystem engine")]
struct Args {
    /// Script file to execute; the interactive prompt starts when omitted.
    script: Option<PathBuf>,

    /// Execute a single command and exit.
    #[arg(short = 'c', long = "command", conflicts_with = "script")]
    command: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let mut shell = Shell::new();

    let result = if let Some(command) = args.command {
        run_line(&mut shell, &command).map(|_| ())
    } else if let Some(script) = args.script {
        run_script(&mut shell, &script)
    } else {
        repl(&mut shell)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Executes one line, printing its output. Returns whether to keep going.
fn run_line(shell: &mut Shell, line: &str) -> anyhow::Result<bool> {
    match shell.execute_line(line)? {
        Outcome::Quiet => Ok(true),
        Outcome::Text(text) => {
            println!("{text}");
            Ok(true)
        }
        Outcome::Exit => Ok(false),
    }
}

/// Runs a script to completion. Failing lines are reported and counted;
/// the run fails when any line failed.
fn run_script(shell: &mut Shell, script: &std::path::Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(script)
        .with_context(|| format!("reading {}", script.display()))?;
    let mut failures = 0usize;
    for (number, line) in content.lines().enumerate() {
        match run_line(shell, line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("ERROR: line {}: {e:#}", number + 1);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} command(s) failed");
    }
    Ok(())
}

fn repl(shell: &mut Shell) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("vdisk> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match run_line(shell, &line) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => eprintln!("ERROR: {e:#}"),
        }
    }
}
