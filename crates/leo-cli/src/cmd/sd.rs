use anyhow::Context;
use clap::Subcommand;
use leo_core::directive::{HandoffDraft, StrategicDirective, SubAgentResult};
use leo_core::store::{DirectiveFilter, DirectiveStore};
use leo_core::types::{HandoffType, Phase, Priority, SdStatus, Verdict};
use leo_core::workflow;
use serde_json::json;

use crate::cmd::{open_store, runtime};
use crate::output::{print_json, print_table, truncate};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum SdSubcommand {
    /// List strategic directives
    List {
        #[arg(long)]
        status: Option<SdStatus>,
        #[arg(long)]
        phase: Option<Phase>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Create a draft directive in the LEAD phase
    Create {
        /// Directive key, e.g. SD-LEO-INFRA-001
        key: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Free-form category such as feature, infrastructure or bugfix
        #[arg(long = "type", value_name = "TYPE")]
        sd_type: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a directive with its handoffs and sub-agent results
    Show {
        /// Directive id or sd_key
        id: String,
    },

    /// Record the next handoff and advance the directive's phase
    Advance {
        id: String,
        /// Handoff type (default: the one that follows the current phase)
        #[arg(long = "type", value_name = "TYPE")]
        handoff_type: Option<HandoffType>,
        /// Executive summary
        #[arg(long)]
        summary: String,
        #[arg(long)]
        completeness: Option<String>,
        #[arg(long = "deliverable")]
        deliverables: Vec<String>,
        #[arg(long = "decision")]
        decisions: Vec<String>,
        #[arg(long = "issue")]
        issues: Vec<String>,
        #[arg(long)]
        resources: Option<String>,
        #[arg(long = "action-item")]
        action_items: Vec<String>,
        #[arg(long)]
        created_by: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },

    /// Defer, cancel or reactivate a directive
    Status {
        id: String,
        status: SdStatus,
        #[arg(long)]
        dry_run: bool,
    },

    /// Record a sub-agent verdict
    Verdict {
        id: String,
        /// Sub-agent code, e.g. TESTING
        #[arg(long)]
        agent: String,
        #[arg(long)]
        verdict: Verdict,
        #[arg(long)]
        confidence: i64,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long = "issue")]
        issues: Vec<String>,
        #[arg(long = "warning")]
        warnings: Vec<String>,
        #[arg(long = "recommendation")]
        recommendations: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(database_url: Option<&str>, subcmd: SdSubcommand, json: bool) -> anyhow::Result<()> {
    runtime()?.block_on(async {
        let store = open_store(database_url).await?;
        dispatch(store.as_ref(), subcmd, json).await
    })
}

pub(crate) async fn dispatch(
    store: &dyn DirectiveStore,
    subcmd: SdSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        SdSubcommand::List {
            status,
            phase,
            limit,
        } => list(store, status, phase, limit, json).await,
        SdSubcommand::Create {
            key,
            title,
            priority,
            sd_type,
            description,
            dry_run,
        } => {
            let mut sd = StrategicDirective::new(key, title);
            sd.priority = priority;
            sd.sd_type = sd_type;
            sd.description = description;
            let sd = workflow::create(store, sd, dry_run).await?;
            if json {
                print_json(&json!({ "dry_run": dry_run, "directive": sd }))
            } else {
                println!(
                    "{}: created in {} ({}){}",
                    sd.sd_key,
                    sd.current_phase,
                    sd.priority,
                    dry_suffix(dry_run)
                );
                Ok(())
            }
        }
        SdSubcommand::Show { id } => show(store, &id, json).await,
        SdSubcommand::Advance {
            id,
            handoff_type,
            summary,
            completeness,
            deliverables,
            decisions,
            issues,
            resources,
            action_items,
            created_by,
            dry_run,
        } => {
            let draft = HandoffDraft {
                executive_summary: summary,
                completeness_report: completeness.unwrap_or_default(),
                deliverables_manifest: deliverables,
                key_decisions: decisions,
                known_issues: issues,
                resource_utilization: resources.unwrap_or_default(),
                action_items,
                created_by,
            };
            advance(store, &id, handoff_type, draft, dry_run, json).await
        }
        SdSubcommand::Status {
            id,
            status,
            dry_run,
        } => {
            let sd = workflow::set_status(store, &id, status, dry_run).await?;
            if json {
                print_json(&json!({ "dry_run": dry_run, "directive": sd }))
            } else {
                println!("{}: status {}{}", sd.sd_key, sd.status, dry_suffix(dry_run));
                Ok(())
            }
        }
        SdSubcommand::Verdict {
            id,
            agent,
            verdict,
            confidence,
            summary,
            issues,
            warnings,
            recommendations,
            dry_run,
        } => {
            let mut result = SubAgentResult::new(id, agent, verdict, confidence, summary)?;
            result.critical_issues = issues;
            result.warnings = warnings;
            result.recommendations = recommendations;
            let recorded = workflow::record_verdict(store, result, dry_run).await?;
            if json {
                print_json(&json!({ "dry_run": dry_run, "result": recorded }))
            } else {
                println!(
                    "{}: {} {} ({}%){}",
                    recorded.sd_id,
                    recorded.sub_agent_code,
                    recorded.verdict,
                    recorded.confidence,
                    dry_suffix(dry_run)
                );
                Ok(())
            }
        }
    }
}

fn dry_suffix(dry_run: bool) -> &'static str {
    if dry_run {
        " (dry run)"
    } else {
        ""
    }
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

async fn list(
    store: &dyn DirectiveStore,
    status: Option<SdStatus>,
    phase: Option<Phase>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let filter = DirectiveFilter {
        status,
        phase,
        limit: Some(limit),
    };
    let sds = store
        .list_directives(&filter)
        .await
        .context("failed to list directives")?;

    if json {
        return print_json(&sds);
    }
    if sds.is_empty() {
        println!("No strategic directives.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = sds.iter().map(row).collect();
    print_table(
        &["SD", "PHASE", "STATUS", "PRIORITY", "PROGRESS", "TITLE"],
        &rows,
    );
    Ok(())
}

fn row(sd: &StrategicDirective) -> Vec<String> {
    vec![
        sd.sd_key.clone(),
        sd.current_phase.to_string(),
        sd.status.to_string(),
        sd.priority.to_string(),
        format!("{}%", sd.progress),
        truncate(&sd.title, 48),
    ]
}

async fn show(store: &dyn DirectiveStore, id: &str, json: bool) -> anyhow::Result<()> {
    let sd = store
        .get_directive(id)
        .await?
        .with_context(|| format!("strategic directive '{id}' not found"))?;
    let handoffs = store.list_handoffs(&sd.id).await?;
    let results = store.list_sub_agent_results(&sd.id).await?;

    if json {
        return print_json(&json!({
            "directive": sd,
            "handoffs": handoffs,
            "sub_agent_results": results,
        }));
    }

    println!("{}  {}", sd.sd_key, sd.title);
    println!(
        "phase: {}  status: {}  priority: {}  progress: {}%",
        sd.current_phase, sd.status, sd.priority, sd.progress
    );
    match HandoffType::for_transition(sd.current_phase) {
        Some(next) if !sd.status.is_terminal() => println!("next handoff: {next}"),
        _ => {}
    }
    if !sd.description.is_empty() {
        println!("\n{}", sd.description);
    }
    if !handoffs.is_empty() {
        println!("\nHandoffs:");
        for h in &handoffs {
            println!(
                "  {} {} [{}] {}",
                h.created_at.format("%Y-%m-%d %H:%M"),
                h.handoff_type,
                h.status,
                truncate(&h.content.executive_summary, 60)
            );
        }
    }
    if !results.is_empty() {
        println!("\nSub-agent results:");
        for r in &results {
            println!(
                "  {} {} {} ({}%)",
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.sub_agent_code,
                r.verdict,
                r.confidence
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// advance
// ---------------------------------------------------------------------------

async fn advance(
    store: &dyn DirectiveStore,
    id: &str,
    handoff_type: Option<HandoffType>,
    draft: HandoffDraft,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let handoff_type = match handoff_type {
        Some(t) => t,
        None => {
            let sd = store
                .get_directive(id)
                .await?
                .with_context(|| format!("strategic directive '{id}' not found"))?;
            HandoffType::for_transition(sd.current_phase)
                .with_context(|| format!("'{id}' is {}; no handoff follows", sd.current_phase))?
        }
    };

    let advanced = workflow::advance(store, id, handoff_type, draft, dry_run).await?;
    if json {
        return print_json(&json!({
            "dry_run": dry_run,
            "directive": advanced.directive,
            "handoff": advanced.handoff,
        }));
    }
    println!(
        "{}: {} → {} ({}, {}%){}",
        advanced.directive.sd_key,
        advanced.handoff.from_phase,
        advanced.handoff.to_phase,
        advanced.directive.status,
        advanced.directive.progress,
        dry_suffix(dry_run)
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
