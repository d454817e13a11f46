//! CLI entry points.
//!
//! Each `run_*` function performs one lifecycle operation as the given user
//! and prints a human-readable report to stdout.

use std::path::Path;

use anyhow::{Context, Result};

use docchat_core::adapters::ProfileProvider;
use docchat_core::models::{ChatTurn, UserProfile};

use crate::app;
use crate::auth::TokenGateway;
use crate::config::Config;

pub async fn run_ingest(config: &Config, user: &str, path: &Path) -> Result<()> {
    let app = app::build(config).await?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let doc = app.service.ingest(user, &filename, &bytes).await?;

    println!("ingest {}", filename);
    println!("  id:    {}", doc.id);
    println!("  chars: {}", doc.text.chars().count());
    println!("ok");
    Ok(())
}

pub async fn run_list(config: &Config, user: &str, summarized: bool) -> Result<()> {
    let app = app::build(config).await?;

    if summarized {
        let docs = app.service.list_summarized(user).await?;
        if docs.is_empty() {
            println!("No summarized documents.");
        }
        for doc in docs {
            println!("{}  {}", doc.id, doc.filename);
            println!("    {}", doc.summary.as_deref().unwrap_or_default());
        }
        return Ok(());
    }

    let listing = app.service.list_documents(user).await?;
    if !listing.found {
        println!("No documents found for {}.", user);
        return Ok(());
    }
    for doc in listing.documents {
        let created = format_ts_iso(doc.created_at);
        let state = if doc.summarized { "summarized" } else { "raw" };
        println!(
            "{}  {:<32} {}  {:<10} {} turns",
            doc.id, doc.filename, created, state, doc.turns
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, user: &str, id: &str) -> Result<()> {
    let app = app::build(config).await?;
    let doc = app.service.get_document(user, id).await?;

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("filename:   {}", doc.filename);
    println!("created_at: {}", format_ts_iso(doc.created_at));
    println!("turns:      {}", doc.chat_history.len());
    println!();
    println!("--- Summary ---");
    println!("{}", doc.summary.as_deref().unwrap_or("(not summarized)"));
    println!();
    println!("--- Text ---");
    println!("{}", doc.text);
    Ok(())
}

pub async fn run_summarize(config: &Config, user: &str, id: &str) -> Result<()> {
    let app = app::build(config).await?;
    let outcome = app.service.summarize(user, id).await?;

    let source = if outcome.cache_hit { "cached" } else { "generated" };
    println!("--- Summary ({}) ---", source);
    println!("{}", outcome.summary);
    Ok(())
}

pub async fn run_ask(config: &Config, user: &str, id: &str, question: &str) -> Result<()> {
    let app = app::build(config).await?;
    let turn = app.service.ask(user, id, question).await?;
    print_turn(&turn);
    Ok(())
}

pub async fn run_history(config: &Config, user: &str, id: &str) -> Result<()> {
    let app = app::build(config).await?;
    let turns = app.service.chat_history(user, id).await?;

    println!("--- Chat ({} turns) ---", turns.len());
    for turn in &turns {
        print_turn(turn);
        println!();
    }
    Ok(())
}

pub async fn run_profile(
    config: &Config,
    user: &str,
    age: Option<u32>,
    interests: Vec<String>,
) -> Result<()> {
    let app = app::build(config).await?;

    let profile = if age.is_none() && interests.is_empty() {
        app.profiles.get_profile(user).await?.unwrap_or_default()
    } else {
        app.profiles
            .upsert(user, &UserProfile { age, interests })
            .await?
    };

    println!("user:      {}", user);
    println!(
        "age:       {}",
        profile
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "(unset)".to_string())
    );
    if profile.interests.is_empty() {
        println!(
            "interests: (none, using \"{}\")",
            config.generation.default_interests
        );
    } else {
        println!("interests: {}", profile.interests.join(", "));
    }
    Ok(())
}

pub fn run_token(config: &Config, user: &str) -> Result<()> {
    let gateway = TokenGateway::from_config(&config.auth)?;
    println!("{}", gateway.issue(user)?);
    Ok(())
}

fn print_turn(turn: &ChatTurn) {
    println!("[{}]", turn.timestamp.format("%Y-%m-%dT%H:%M:%SZ"));
    println!("Q: {}", turn.question);
    println!("A: {}", turn.answer);
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
