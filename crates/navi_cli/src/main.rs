//! NAVI knowledge store CLI.
//!
//! # Responsibility
//! - Open one store from flags, run one command against it, then flush.
//! - Print JSON for structured values and one-line summaries for edits.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RecordMode, SessionCommands, SettingsCommands};
use log::warn;
use navi_core::{
    default_log_level, init_logging, ConversationResponse, ImportSnapshot, KnowledgeService,
    NewNode, NodePatch, SqliteKvBackend, StoreConfig, ROOT_NODE_ID,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    let config = match &cli.db {
        Some(path) => StoreConfig::file(path),
        None => StoreConfig::in_memory(),
    }
    .with_quota(cli.quota_bytes);
    let mut service = config
        .open_service()
        .context("failed to open knowledge store")?;

    run(&mut service, cli.command)?;

    if !service.flush() {
        warn!("event=cli_flush module=cli status=error");
        bail!("some edits could not be persisted");
    }
    Ok(())
}

fn run(service: &mut KnowledgeService<SqliteKvBackend>, command: Commands) -> Result<()> {
    match command {
        Commands::Tree { query } => print_json(&service.filtered_view(query.as_deref()))?,
        Commands::Add {
            parent,
            title,
            content,
            kind,
        } => {
            let data = NewNode {
                title,
                content,
                kind,
                timestamp: None,
            };
            match service.add_child(&parent, data).node_id {
                Some(id) => println!("added {id}"),
                None => bail!("parent `{parent}` not found"),
            }
        }
        Commands::Update {
            id,
            title,
            content,
            kind,
        } => {
            let patch = NodePatch {
                title,
                content,
                kind,
                timestamp: None,
            };
            let changed = service.update_node(&id, &patch).changed;
            let exists = service.find_node(&id).is_some();
            println!("{}", describe_node_edit(NodeEdit::Update, &id, changed, exists)?);
        }
        Commands::Delete { id } => {
            let changed = service.delete_node(&id).changed;
            let exists = service.find_node(&id).is_some();
            println!("{}", describe_node_edit(NodeEdit::Delete, &id, changed, exists)?);
        }
        Commands::Search { query } => {
            for node in service.search(&query) {
                println!("{}\t{}", node.id, node.title);
            }
        }
        Commands::Record {
            mode,
            input,
            response,
        } => {
            let response = ConversationResponse::new(response);
            let outcome = match mode {
                RecordMode::Learning => service.record_learning(&input, &response),
                RecordMode::Questioning => service.record_questioning(&input, &response),
            };
            match outcome.node_id {
                Some(id) => println!("recorded {id}"),
                None => bail!("input is blank; nothing recorded"),
            }
        }
        Commands::Export { out } => {
            let text = serde_json::to_string_pretty(&service.export_all())?;
            match out {
                Some(path) => fs::write(&path, text)
                    .with_context(|| format!("failed to write `{}`", path.display()))?,
                None => println!("{text}"),
            }
        }
        Commands::Import { file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read `{}`", file.display()))?;
            let snapshot: ImportSnapshot =
                serde_json::from_str(&text).context("snapshot is not valid JSON")?;
            if snapshot.is_empty() {
                bail!("snapshot carries no sessions, knowledgeGraph or settings");
            }
            if !service.import(snapshot) {
                bail!("import was only partially written");
            }
            println!("imported {}", file.display());
        }
        Commands::Usage => {
            let estimate = service.estimate_usage();
            print_json(&serde_json::json!({
                "estimate": estimate,
                "usagePercentage": estimate.usage_percentage(),
                "keys": service.storage_info(),
            }))?;
        }
        Commands::Evict => println!("evicted {}", service.evict_stale_sessions()),
        Commands::Session { action } => run_session(service, action)?,
        Commands::Settings { action } => match action {
            SettingsCommands::Show => print_json(service.settings())?,
            SettingsCommands::Set { options } => {
                let patch = parse_assignments(&options)?;
                let outcome = service
                    .update_settings(&patch)
                    .context("settings patch rejected")?;
                if outcome.changed {
                    println!("settings updated");
                } else {
                    println!("settings unchanged");
                }
            }
        },
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to clear without --yes");
            }
            if !service.clear_all() {
                bail!("some keys could not be removed");
            }
            println!("cleared");
        }
    }
    Ok(())
}

fn run_session(
    service: &mut KnowledgeService<SqliteKvBackend>,
    action: SessionCommands,
) -> Result<()> {
    match action {
        SessionCommands::List => {
            for (id, record) in service.sessions() {
                let last = record
                    .last_activity()
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{id}\t{last}");
            }
        }
        SessionCommands::Show { id } => match service.session(&id) {
            Some(record) => print_json(record)?,
            None => bail!("session `{id}` not found"),
        },
        SessionCommands::Save { id, attributes } => {
            service.save_session(&id, parse_assignments(&attributes)?);
            println!("saved {id}");
        }
        SessionCommands::Delete { id } => {
            if service.delete_session(&id).changed {
                println!("deleted {id}");
            } else {
                println!("no change: session `{id}` not found");
            }
        }
    }
    Ok(())
}

/// Parses `name=value` pairs; values that are not JSON are taken as strings.
fn parse_assignments(items: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for item in items {
        let Some((name, raw)) = item.split_once('=') else {
            bail!("expected NAME=VALUE, got `{item}`");
        };
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(name.trim().to_string(), value);
    }
    Ok(map)
}

#[derive(Clone, Copy)]
enum NodeEdit {
    Update,
    Delete,
}

/// Summary line for a node edit; unchanged edits name their cause.
fn describe_node_edit(edit: NodeEdit, id: &str, changed: bool, exists: bool) -> Result<String> {
    match (edit, changed) {
        (NodeEdit::Update, true) => Ok(format!("updated {id}")),
        (NodeEdit::Delete, true) => Ok(format!("deleted {id}")),
        (NodeEdit::Delete, false) if id == ROOT_NODE_ID => {
            bail!("the `{ROOT_NODE_ID}` node cannot be deleted")
        }
        (_, false) if !exists => bail!("node `{id}` not found"),
        (_, false) => Ok(format!("no change: `{id}` already has these values")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{describe_node_edit, parse_assignments, NodeEdit};
    use serde_json::json;

    #[test]
    fn assignments_parse_json_or_fall_back_to_string() {
        let map = parse_assignments(&[
            "theme=light".to_string(),
            "autoSave=false".to_string(),
            "maxHistoryLength=20".to_string(),
        ])
        .unwrap();
        assert_eq!(map["theme"], json!("light"));
        assert_eq!(map["autoSave"], json!(false));
        assert_eq!(map["maxHistoryLength"], json!(20));
    }

    #[test]
    fn assignment_without_equals_is_rejected() {
        assert!(parse_assignments(&["theme".to_string()]).is_err());
    }

    #[test]
    fn unchanged_node_edits_name_their_cause() {
        let root = describe_node_edit(NodeEdit::Delete, "root", false, true).unwrap_err();
        assert!(root.to_string().contains("cannot be deleted"), "{root}");

        let missing = describe_node_edit(NodeEdit::Delete, "n-9", false, false).unwrap_err();
        assert!(missing.to_string().contains("not found"), "{missing}");

        let same = describe_node_edit(NodeEdit::Update, "n-1", false, true).unwrap();
        assert!(same.contains("already has these values"), "{same}");

        let deleted = describe_node_edit(NodeEdit::Delete, "n-1", true, false).unwrap();
        assert_eq!(deleted, "deleted n-1");
    }
}
