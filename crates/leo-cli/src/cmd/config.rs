use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use leo_core::config::{Config, WarnLevel};
use leo_core::{io, paths};
use leo_queue::QueueName;

use crate::output::print_json;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config (defaults filled in)
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Change the agent defaults used by `leo run`
    Agent {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_turns: Option<u32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        system_prompt: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::Agent {
            model,
            max_turns,
            max_tokens,
            system_prompt,
        } => set_agent(root, model, max_turns, max_tokens, system_prompt),
    }
}

/// `leo init`: write a default config unless one exists.
pub fn init(root: &Path, json: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    let yaml = serde_yaml::to_string(&Config::default())?;
    let written = io::write_if_missing(&path, yaml.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "path": path,
            "created": written,
        }));
    }
    if written {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists; left unchanged.", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let known: Vec<&str> = QueueName::all().iter().map(|q| q.as_str()).collect();
    let warnings = config.validate(&known);

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// agent
// ---------------------------------------------------------------------------

fn set_agent(
    root: &Path,
    model: Option<String>,
    max_turns: Option<u32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(root).context("failed to load config")?;
    if let Some(m) = model {
        config.agent.model = Some(m);
    }
    if let Some(n) = max_turns {
        config.agent.max_turns = n;
    }
    if let Some(n) = max_tokens {
        config.agent.max_tokens = n;
    }
    if let Some(p) = system_prompt {
        config.agent.system_prompt = Some(p);
    }
    config.save(root).context("failed to save config")?;
    println!(
        "agent: model {}, max_turns {}, max_tokens {}",
        config.agent.model.as_deref().unwrap_or("(default)"),
        config.agent.max_turns,
        config.agent.max_tokens
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), false).unwrap();
        let first = std::fs::read_to_string(paths::config_path(dir.path())).unwrap();
        init(dir.path(), false).unwrap();
        let second = std::fs::read_to_string(paths::config_path(dir.path())).unwrap();
        assert_eq!(first, second);
        assert_eq!(Config::load_or_default(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn set_agent_persists_fields() {
        let dir = TempDir::new().unwrap();
        set_agent(dir.path(), Some("claude-x".into()), Some(5), None, None).unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.agent.model.as_deref(), Some("claude-x"));
        assert_eq!(config.agent.max_turns, 5);
    }

    #[test]
    fn validate_fails_on_errors_only() {
        let dir = TempDir::new().unwrap();
        let yaml = "queues:\n  concurrency:\n    publish-threads: 1\n";
        io::atomic_write(&paths::config_path(dir.path()), yaml.as_bytes()).unwrap();
        validate(dir.path(), false).unwrap();

        let yaml = "queues:\n  concurrency:\n    publish-x: 0\n";
        io::atomic_write(&paths::config_path(dir.path()), yaml.as_bytes()).unwrap();
        assert!(validate(dir.path(), false).is_err());
    }
}
