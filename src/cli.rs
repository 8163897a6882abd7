//! Command line surface over a file-backed store and a directory cache

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use muster::cache::DirCacheStore;
use muster::config::Config;
use muster::engine::{SuggestRequest, SuggestionEngine};
use muster::error::MusterError;
use muster::quality::FilterContext;
use muster::store::{
    AdminUpdate, FileBackend, RemoteSuggestionStore, SuggestionRef, UsageEvent, UsageMetadata,
};
use muster::suggestion::{Scope, SuggestionType};

/// Usage-ranked faction and unit name suggestions
#[derive(Parser, Debug)]
#[command(version, about = "Usage-ranked faction and unit name suggestions")]
pub struct Cli {
    /// Suggestion data file
    #[arg(long, global = true, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Directory holding cached suggestion lists
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    #[arg(long)]
    pub manufacturer: String,

    #[arg(long)]
    pub game: String,

    /// Required for units
    #[arg(long)]
    pub faction: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> Scope {
        let scope = Scope::new(&self.manufacturer, &self.game);
        match &self.faction {
            Some(faction) => scope.with_faction(faction),
            None => scope,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// faction, unit, manufacturer or game
    #[arg(value_parser = parse_kind)]
    pub kind: SuggestionType,

    pub name: String,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

impl TargetArgs {
    fn target(&self) -> SuggestionRef {
        SuggestionRef::new(self.kind, self.scope.scope(), &self.name)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record one use of a name
    Record {
        #[arg(value_parser = parse_kind)]
        kind: SuggestionType,
        value: String,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Opaque id of whoever used the name
        #[arg(long)]
        actor: Option<String>,
    },
    /// List suggestions for a partially typed name
    Suggest {
        #[arg(value_parser = parse_kind)]
        kind: SuggestionType,
        #[arg(default_value = "")]
        term: String,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Filter preset: autocomplete, public or admin
        #[arg(long, value_parser = parse_context)]
        context: Option<FilterContext>,
    },
    /// Aggregate counts for a manufacturer and game
    Stats {
        #[arg(long)]
        manufacturer: String,
        #[arg(long)]
        game: String,
    },
    /// Always show a suggestion
    Promote(TargetArgs),
    /// Undo a promotion
    Demote(TargetArgs),
    /// Never show a suggestion
    Block {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    Unblock(TargetArgs),
    /// Count a user report against a suggestion
    Report(TargetArgs),
    Delete(TargetArgs),
    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    Stats,
    Clear,
}

fn parse_kind(s: &str) -> Result<SuggestionType, String> {
    SuggestionType::parse(s)
        .ok_or_else(|| format!("unknown kind '{}' (faction, unit, manufacturer, game)", s))
}

fn parse_context(s: &str) -> Result<FilterContext, String> {
    FilterContext::parse(s)
        .ok_or_else(|| format!("unknown context '{}' (autocomplete, public, admin)", s))
}

pub async fn run(cli: Cli, config: Config) -> Result<(), MusterError> {
    let context = match &cli.command {
        Command::Suggest {
            context: Some(context),
            ..
        } => *context,
        _ => config.autocomplete.quality,
    };
    let engine = open_engine(cli.data, cli.cache_dir, &config, context)?;
    run_command(cli.command, &engine).await
}

fn open_engine(
    data: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    config: &Config,
    context: FilterContext,
) -> Result<SuggestionEngine, MusterError> {
    let data_path = data
        .or_else(|| config.store.resolved_data_path())
        .ok_or_else(|| MusterError::Config("no data directory; pass --data".into()))?;
    let cache_dir = cache_dir
        .or_else(|| config.cache.resolved_dir())
        .ok_or_else(|| MusterError::Config("no cache directory; pass --cache-dir".into()))?;

    log::debug!("Using data file {:?} and cache {:?}", data_path, cache_dir);
    let backend = FileBackend::open(data_path)?;
    let store = RemoteSuggestionStore::with_options(Arc::new(backend), config.store.options());

    Ok(
        SuggestionEngine::new(Arc::new(store), Box::new(DirCacheStore::new(cache_dir)))
            .with_cache_options(config.cache.options())
            .with_context(context),
    )
}

async fn run_command(command: Command, engine: &SuggestionEngine) -> Result<(), MusterError> {
    let store = engine.store();
    match command {
        Command::Record {
            kind,
            value,
            scope,
            actor,
        } => {
            let event = UsageEvent::new(kind, scope.scope(), value).with_metadata(UsageMetadata {
                actor,
                source: Some("cli".to_string()),
            });
            let outcome = engine.record(&event).await?;
            let suffix = if outcome.created { " [new]" } else { "" };
            println!(
                "Recorded {} (count {}){}",
                outcome.suggestion.name, outcome.suggestion.count, suffix
            );
        }
        Command::Suggest {
            kind, term, scope, ..
        } => {
            let request = SuggestRequest::new(kind, scope.scope(), term);
            let response = engine.suggest(&request).await?;
            for suggestion in &response.suggestions {
                println!("{}\t{}", suggestion.original_name, suggestion.count);
            }
        }
        Command::Stats { manufacturer, game } => {
            let stats = store.get_stats(&manufacturer, &game).await?;
            println!("total: {}", stats.total);
            for (kind, count) in &stats.by_type {
                println!("  {}: {}", kind, count);
            }
            println!("promoted: {}", stats.promoted);
            println!("blocked: {}", stats.blocked);
            println!("reported: {}", stats.reported);
            println!("usage: {}", stats.total_usage);
            for (name, count) in &stats.top {
                println!("top: {}\t{}", name, count);
            }
        }
        Command::Promote(target) => {
            moderate(engine, &target, &AdminUpdate::promote(), "Promoted").await?;
        }
        Command::Demote(target) => {
            moderate(engine, &target, &AdminUpdate::demote(), "Demoted").await?;
        }
        Command::Block { target, reason } => {
            moderate(engine, &target, &AdminUpdate::block(reason), "Blocked").await?;
        }
        Command::Unblock(target) => {
            moderate(engine, &target, &AdminUpdate::unblock(), "Unblocked").await?;
        }
        Command::Report(target) => {
            let doc = store.report(&target.target()).await?;
            engine.invalidate(target.kind, &target.scope.scope());
            println!("Reported {} ({} reports)", doc.name, doc.report_count);
        }
        Command::Delete(target) => {
            store.delete(&target.target()).await?;
            engine.invalidate(target.kind, &target.scope.scope());
            println!("Deleted {}", target.name);
        }
        Command::Cache {
            action: CacheCommand::Stats,
        } => {
            let stats = engine.cache_stats();
            println!("entries: {}", stats.count);
            println!("items: {}", stats.total_items);
            println!("bytes: {}", stats.total_size_bytes);
            println!("avg hits: {:.2}", stats.avg_hit_count);
            for (kind, count) in &stats.by_type {
                println!("  {}: {}", kind, count);
            }
        }
        Command::Cache {
            action: CacheCommand::Clear,
        } => {
            println!("Removed {} cache entries", engine.clear_cache());
        }
    }
    Ok(())
}

async fn moderate(
    engine: &SuggestionEngine,
    target: &TargetArgs,
    update: &AdminUpdate,
    verb: &str,
) -> Result<(), MusterError> {
    let doc = engine.store().update(&target.target(), update).await?;
    engine.invalidate(target.kind, &target.scope.scope());
    println!("{} {}", verb, doc.name);
    Ok(())
}
