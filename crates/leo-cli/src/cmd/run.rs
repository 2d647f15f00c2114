use std::path::Path;

use anyhow::Context;
use clap::Args;
use leo_agent::{run_programmatic_task, AnthropicClient, Effort, ModelTier, TaskOptions, TaskStop};
use leo_core::config::{AgentConfig, Config};

use crate::cmd::{open_store, runtime};
use crate::output::print_json;
use crate::tools;

#[derive(Args)]
pub struct RunArgs {
    /// Task for the model, e.g. "Advance SD-LEO-001 to EXEC if its PRD is approved"
    pub prompt: String,

    /// Let the model call tools without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Full model id (overrides --tier and agent.model)
    #[arg(long)]
    pub model: Option<String>,

    /// Model tier: haiku, sonnet or opus
    #[arg(long)]
    pub tier: Option<String>,

    /// Maximum model calls (default: agent.max_turns)
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Maximum tokens per response (default: agent.max_tokens)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Extended thinking effort: low, medium or high
    #[arg(long)]
    pub effort: Option<String>,

    /// System prompt (default: agent.system_prompt)
    #[arg(long)]
    pub system: Option<String>,
}

pub fn run(root: &Path, database_url: Option<&str>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let options = task_options(&config.agent, &args)?;
    let client = AnthropicClient::from_env()?;

    let rt = runtime()?;
    let result = rt.block_on(async {
        let store = open_store(database_url).await?;
        let tools = tools::tool_set(store)?;
        tracing::info!(model = %options.model, tools = tools.len(), dry_run = options.dry_run, "starting task");
        run_programmatic_task(&client, &args.prompt, &tools, &options)
            .await
            .context("programmatic task failed")
    })?;

    if json {
        return print_json(&result);
    }

    println!("{}", result.text);
    for call in &result.tool_calls {
        let marker = if call.is_error { "error" } else { "ok" };
        eprintln!("  [turn {}] {} ({marker})", call.turn, call.name);
    }
    match &result.stop {
        TaskStop::EndTurn => {}
        TaskStop::TurnLimit => eprintln!("warning: stopped at the turn limit ({} turns)", result.turns),
        TaskStop::Model(reason) => eprintln!("warning: model stopped with {reason:?}"),
    }
    if options.dry_run {
        eprintln!("(dry run: nothing was written)");
    }
    Ok(())
}

/// Flags win over `.leo/config.yaml`; an explicit model id wins over a tier.
pub(crate) fn task_options(agent: &AgentConfig, args: &RunArgs) -> anyhow::Result<TaskOptions> {
    let model = match (&args.model, &args.tier) {
        (Some(model), _) => model.clone(),
        (None, Some(tier)) => tier.parse::<ModelTier>()?.default_model().to_string(),
        (None, None) => agent
            .model
            .clone()
            .unwrap_or_else(|| ModelTier::default().default_model().to_string()),
    };
    let effort = args.effort.as_deref().map(str::parse::<Effort>).transpose()?;

    Ok(TaskOptions {
        dry_run: args.dry_run,
        model,
        max_tokens: args.max_tokens.unwrap_or(agent.max_tokens),
        max_turns: args.max_turns.unwrap_or(agent.max_turns),
        system_prompt: args.system.clone().or_else(|| agent.system_prompt.clone()),
        effort,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            prompt: "summarise".into(),
            dry_run: false,
            model: None,
            tier: None,
            max_turns: None,
            max_tokens: None,
            effort: None,
            system: None,
        }
    }

    #[test]
    fn config_supplies_defaults() {
        let agent = AgentConfig {
            model: Some("claude-custom".into()),
            max_turns: 7,
            system_prompt: Some("You are the LEAD agent.".into()),
            ..Default::default()
        };
        let opts = task_options(&agent, &args()).unwrap();
        assert_eq!(opts.model, "claude-custom");
        assert_eq!(opts.max_turns, 7);
        assert_eq!(opts.system_prompt.as_deref(), Some("You are the LEAD agent."));
        assert_eq!(opts.max_tokens, leo_core::config::DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn flags_override_config() {
        let agent = AgentConfig {
            model: Some("claude-custom".into()),
            ..Default::default()
        };
        let mut a = args();
        a.tier = Some("opus".into());
        a.max_turns = Some(3);
        a.dry_run = true;
        a.effort = Some("high".into());
        let opts = task_options(&agent, &a).unwrap();
        assert_eq!(opts.model, ModelTier::Opus.default_model());
        assert_eq!(opts.max_turns, 3);
        assert!(opts.dry_run);
        assert_eq!(opts.effort, Some(Effort::High));

        a.model = Some("claude-explicit".into());
        assert_eq!(task_options(&agent, &a).unwrap().model, "claude-explicit");
    }

    #[test]
    fn unknown_tier_or_effort_errors() {
        let mut a = args();
        a.tier = Some("gigantic".into());
        assert!(task_options(&AgentConfig::default(), &a).is_err());

        let mut a = args();
        a.effort = Some("extreme".into());
        assert!(task_options(&AgentConfig::default(), &a).is_err());
    }
}
