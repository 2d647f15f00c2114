use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Subcommand;
use leo_core::config::Config;
use leo_core::gate::{score_gates, GateDefinition, GateReport, GateResult};
use serde::Serialize;
use tokio::process::Command;

use crate::cmd::runtime;
use crate::output::{print_json, print_table};

const MAX_OUTPUT: usize = 10 * 1024;

#[derive(Subcommand)]
pub enum GateSubcommand {
    /// Run every configured gate in order and score the results
    Run {
        /// Minimum normalized score (0-100) for the run to pass
        #[arg(long, default_value = "0")]
        threshold: u32,
    },

    /// List the configured gates
    List,
}

pub fn run(root: &Path, subcmd: GateSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    match subcmd {
        GateSubcommand::Run { threshold } => run_and_score(root, &config.gates, threshold, json),
        GateSubcommand::List => list(&config.gates, json),
    }
}

#[derive(Serialize)]
struct GateRun {
    threshold: u32,
    report: GateReport,
    results: Vec<GateResult>,
}

fn run_and_score(
    root: &Path,
    gates: &[GateDefinition],
    threshold: u32,
    json: bool,
) -> anyhow::Result<()> {
    let results = runtime()?.block_on(run_gates(root, gates));
    let report = score_gates(&results);

    if json {
        print_json(&GateRun {
            threshold,
            report: report.clone(),
            results,
        })?;
    } else {
        if gates.is_empty() {
            println!("No gates configured.");
        }
        for r in &results {
            let mark = if r.passed { "pass" } else { "FAIL" };
            println!(
                "[{mark}] {} (attempt {}, {} ms)",
                r.gate_name, r.attempt, r.duration_ms
            );
            if !r.passed && !r.output.is_empty() {
                let lines: Vec<&str> = r.output.lines().collect();
                for line in &lines[lines.len().saturating_sub(20)..] {
                    println!("    {line}");
                }
            }
        }
        for w in &report.warnings {
            println!("warning: {w}");
        }
        println!("score: {}/100", report.normalized_score);
    }

    if let Some(gate) = &report.failed_gate {
        anyhow::bail!("required gate '{gate}' failed");
    }
    if !report.meets(threshold) {
        anyhow::bail!(
            "gate score {} is below the threshold {threshold}",
            report.normalized_score
        );
    }
    Ok(())
}

fn list(gates: &[GateDefinition], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&gates);
    }
    if gates.is_empty() {
        println!("No gates configured. Add them under `gates:` in .leo/config.yaml.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = gates
        .iter()
        .map(|g| {
            vec![
                g.name.clone(),
                g.weight.to_string(),
                if g.required { "yes" } else { "no" }.to_string(),
                g.max_retries.to_string(),
                format!("{}s", g.timeout_seconds),
                g.command.clone(),
            ]
        })
        .collect();
    print_table(
        &["GATE", "WEIGHT", "REQUIRED", "RETRIES", "TIMEOUT", "COMMAND"],
        &rows,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run `gates` in order, one result per gate (its last attempt).
///
/// Stops after the first required gate that still fails once its retries
/// are used up. `max_retries` counts extra attempts, so a gate runs at most
/// `max_retries + 1` times.
pub(crate) async fn run_gates(root: &Path, gates: &[GateDefinition]) -> Vec<GateResult> {
    let mut results = Vec::with_capacity(gates.len());

    for gate in gates {
        let result = run_gate(root, gate).await;
        let stop = !result.passed && gate.required;
        results.push(result);
        if stop {
            break;
        }
    }
    results
}

async fn run_gate(root: &Path, gate: &GateDefinition) -> GateResult {
    if gate.command.trim().is_empty() {
        return GateResult::new(gate, false, "gate command is empty".into(), 1);
    }

    let timeout = (gate.timeout_seconds > 0)
        .then(|| Duration::from_secs(u64::from(gate.timeout_seconds)));
    let max_attempts = gate.max_retries + 1;
    let mut last = None;

    for attempt in 1..=max_attempts {
        let start = Instant::now();
        let (passed, output) = execute_shell(&gate.command, root, timeout).await;
        let mut result = GateResult::new(gate, passed, output, attempt);
        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(gate = %gate.name, attempt, passed, "gate attempt finished");
        if passed {
            return result;
        }
        last = Some(result);
    }

    last.unwrap_or_else(|| GateResult::new(gate, false, "gate never ran".into(), 0))
}

/// Run `command` under `sh -c` in `cwd`. Returns (exit status 0, combined output).
async fn execute_shell(command: &str, cwd: &Path, timeout: Option<Duration>) -> (bool, String) {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let child = match child {
        Ok(c) => c,
        Err(e) => return (false, format!("failed to spawn: {e}")),
    };

    let waited = match timeout {
        None => child.wait_with_output().await,
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(out) => out,
            // Dropping the future drops the child, which kills it.
            Err(_) => return (false, format!("timed out after {}s", limit.as_secs())),
        },
    };

    match waited {
        Ok(out) => format_output(
            out.status.success(),
            &String::from_utf8_lossy(&out.stdout),
            &String::from_utf8_lossy(&out.stderr),
        ),
        Err(e) => (false, format!("wait failed: {e}")),
    }
}

/// Combine stdout and stderr, keeping at most the last 10 KB.
fn format_output(success: bool, stdout: &str, stderr: &str) -> (bool, String) {
    let output = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (_, true) => stdout.trim().to_string(),
        (true, false) => stderr.trim().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim(), stderr.trim()),
    };
    (success, tail(&output, MAX_OUTPUT).to_string())
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
