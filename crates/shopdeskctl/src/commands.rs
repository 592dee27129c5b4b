//! Command handlers
//!
//! Each handler opens nothing itself; `run` resolves config and the
//! database once and hands a `Context` to the handler.

use anyhow::{anyhow, bail, Context as _, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

use shopdesk_common::totals::OrderAmounts;
use shopdesk_common::{
    BulkMode, EntityId, EntityKind, NewEntity, ScopeId, ShopdeskConfig, SqliteStore, StatusManager,
};

use crate::cli::{Cli, Commands};
use crate::errors::{EXIT_PARTIAL, EXIT_SUCCESS};
use crate::logging;
use crate::output;

/// Resolved state shared by every command
pub struct Context {
    pub manager: StatusManager<SqliteStore>,
    pub config: ShopdeskConfig,
    pub db_path: PathBuf,
    pub json: bool,
}

impl Context {
    pub fn open(cli: &Cli) -> Result<Self> {
        // `init --write-config` may name a config file that does not exist yet
        let creating = matches!(cli.command, Commands::Init { write_config: true });
        let explicit = cli.config.as_deref().filter(|path| !creating || path.exists());
        let config = ShopdeskConfig::load(explicit).context("Failed to load configuration")?;
        logging::init(&config.log.level, cli.verbose);

        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => config.db_path()?,
        };
        debug!("Using database {}", db_path.display());

        let store = SqliteStore::open_at(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let manager = StatusManager::new(store).with_config(config.manager.clone());

        Ok(Self {
            manager,
            config,
            db_path,
            json: cli.json,
        })
    }
}

fn parse_kind(raw: &str) -> Result<EntityKind> {
    EntityKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow!("Unknown entity kind '{}' (known: {})", raw, known.join(", "))
    })
}

/// Run the parsed command; returns the process exit code
pub fn run(cli: Cli) -> Result<i32> {
    let ctx = Context::open(&cli)?;

    match cli.command {
        Commands::Init { write_config } => {
            let target = if write_config {
                Some(match &cli.config {
                    Some(path) => path.clone(),
                    None => ShopdeskConfig::user_config_path()?,
                })
            } else {
                None
            };
            init(&ctx, target.as_deref())
        }
        Commands::Create { kind, scope, flags } => create(&ctx, &kind, scope, &flags),
        Commands::Show { id } => show(&ctx, id),
        Commands::List { kind, scope } => list(&ctx, &kind, scope),
        Commands::SetDefault { scope, id, flag } => set_default(&ctx, scope, id, &flag),
        Commands::Toggle { id, flag } => toggle(&ctx, id, &flag),
        Commands::Set { id, flag, value } => set(&ctx, id, &flag, value),
        Commands::Transition { id, status } => transition(&ctx, id, &status),
        Commands::Bulk { flag, value, ids, mode } => bulk(ctx, &flag, value, &ids, mode.as_deref()),
        Commands::Replicate { id } => replicate(&ctx, id),
        Commands::Badge { kind, flag } => badge(&ctx, &kind, &flag),
        Commands::Summary { kind } => summary(&ctx, &kind),
        Commands::Usage { id, record } => usage(&ctx, id, record.as_deref()),
        Commands::Events { limit } => events(&ctx, limit),
        Commands::Total {
            subtotal,
            tax,
            shipping,
            discount,
        } => total(&ctx, OrderAmounts { subtotal, tax, shipping, discount }),
    }
}

fn print_entity_result(ctx: &Context, entity: &shopdesk_common::Entity) -> Result<i32> {
    if ctx.json {
        output::print_json(entity)?;
    } else {
        output::print_entity(entity);
    }
    Ok(EXIT_SUCCESS)
}

fn init(ctx: &Context, config_target: Option<&Path>) -> Result<i32> {
    if let Some(path) = config_target {
        ctx.config
            .save_to(path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        debug!("Wrote config to {}", path.display());
    }

    if ctx.json {
        output::print_json(&json!({
            "database": ctx.db_path,
            "bulk_mode": ctx.config.manager.bulk_mode,
            "config_written": config_target,
        }))?;
    } else {
        println!("Database ready at {}", ctx.db_path.display());
        if let Some(path) = config_target {
            println!("Config written to {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}

fn create(ctx: &Context, kind: &str, scope: Option<i64>, flags: &[String]) -> Result<i32> {
    let mut new = NewEntity::new(parse_kind(kind)?);
    new.scope_id = scope.map(ScopeId);
    for flag in flags {
        new = new.with_flag(flag.as_str(), true);
    }

    let entity = ctx.manager.create(new).context("Failed to create entity")?;
    print_entity_result(ctx, &entity)
}

fn show(ctx: &Context, id: i64) -> Result<i32> {
    let entity = ctx.manager.find(EntityId(id))?;
    print_entity_result(ctx, &entity)
}

fn list(ctx: &Context, kind: &str, scope: Option<i64>) -> Result<i32> {
    let kind = parse_kind(kind)?;
    let entities = match scope {
        Some(scope) => ctx.manager.list_in_scope(kind, ScopeId(scope))?,
        None => ctx.manager.list(kind)?,
    };

    if ctx.json {
        output::print_json(&entities)?;
    } else {
        output::print_entities(&entities);
    }
    Ok(EXIT_SUCCESS)
}

fn set_default(ctx: &Context, scope: i64, id: i64, flag: &str) -> Result<i32> {
    let entity = ctx
        .manager
        .set_exclusive_flag(ScopeId(scope), EntityId(id), flag)
        .with_context(|| format!("Failed to set {} on #{}", flag, id))?;
    print_entity_result(ctx, &entity)
}

fn toggle(ctx: &Context, id: i64, flag: &str) -> Result<i32> {
    let value = ctx
        .manager
        .toggle_flag(EntityId(id), flag)
        .with_context(|| format!("Failed to toggle {} on #{}", flag, id))?;

    if ctx.json {
        output::print_json(&json!({ "id": id, "flag": flag, "value": value }))?;
    } else {
        println!("#{} {} = {}", id, flag, value);
    }
    Ok(EXIT_SUCCESS)
}

fn set(ctx: &Context, id: i64, flag: &str, value: bool) -> Result<i32> {
    let entity = ctx
        .manager
        .set_flag(EntityId(id), flag, value)
        .with_context(|| format!("Failed to set {} on #{}", flag, id))?;
    print_entity_result(ctx, &entity)
}

fn transition(ctx: &Context, id: i64, status: &str) -> Result<i32> {
    let entity = ctx
        .manager
        .transition_named(EntityId(id), status)
        .with_context(|| format!("Failed to move #{} to {}", id, status))?;
    print_entity_result(ctx, &entity)
}

fn bulk(ctx: Context, flag: &str, value: bool, ids: &[i64], mode: Option<&str>) -> Result<i32> {
    let Context { manager, config, json, .. } = ctx;
    let manager = match mode {
        Some(raw) => {
            let Some(mode) = BulkMode::parse(raw) else {
                bail!("Unknown bulk mode '{}' (use atomic or best_effort)", raw);
            };
            let mut manager_config = config.manager.clone();
            manager_config.bulk_mode = mode;
            manager.with_config(manager_config)
        }
        None => manager,
    };

    let ids: Vec<EntityId> = ids.iter().copied().map(EntityId).collect();
    let report = manager
        .bulk_apply(&ids, flag, value)
        .with_context(|| format!("Bulk update of {} failed", flag))?;

    if json {
        output::print_json(&report)?;
    } else {
        output::print_bulk(&report);
    }
    Ok(if report.is_complete() { EXIT_SUCCESS } else { EXIT_PARTIAL })
}

fn replicate(ctx: &Context, id: i64) -> Result<i32> {
    let copy = ctx
        .manager
        .replicate(EntityId(id))
        .with_context(|| format!("Failed to replicate #{}", id))?;
    print_entity_result(ctx, &copy)
}

fn badge(ctx: &Context, kind: &str, flag: &str) -> Result<i32> {
    let kind = parse_kind(kind)?;
    let badge = ctx.manager.navigation_badge(kind, flag)?;

    if ctx.json {
        output::print_json(&json!({
            "kind": kind.as_str(),
            "flag": flag,
            "label": badge.label,
            "tier": badge.tier.as_str(),
        }))?;
    } else {
        output::print_badge(kind, flag, &badge);
    }
    Ok(EXIT_SUCCESS)
}

fn summary(ctx: &Context, kind: &str) -> Result<i32> {
    let kind = parse_kind(kind)?;
    let counts = ctx.manager.status_summary(kind)?;

    if ctx.json {
        output::print_json(&counts)?;
    } else {
        output::print_summary(kind, &counts);
    }
    Ok(EXIT_SUCCESS)
}

fn usage(ctx: &Context, id: i64, record: Option<&str>) -> Result<i32> {
    let id = EntityId(id);
    let count = match record {
        Some(reference) => ctx
            .manager
            .record_usage(id, reference)
            .with_context(|| format!("Failed to record usage on {}", id))?,
        None => ctx.manager.usage_count(id)?,
    };

    if ctx.json {
        output::print_json(&json!({ "id": id, "usage_count": count }))?;
    } else {
        println!("{} used {} time(s)", id, count);
    }
    Ok(EXIT_SUCCESS)
}

fn events(ctx: &Context, limit: Option<usize>) -> Result<i32> {
    let limit = limit.unwrap_or(ctx.config.manager.journal_limit);
    let events = ctx.manager.recent_events(limit)?;

    if ctx.json {
        output::print_json(&events)?;
    } else {
        output::print_events(&events);
    }
    Ok(EXIT_SUCCESS)
}

fn total(ctx: &Context, amounts: OrderAmounts) -> Result<i32> {
    let total = amounts.total();
    if ctx.json {
        output::print_json(&json!({ "amounts": amounts, "total": total }))?;
    } else {
        output::print_total(total);
    }
    Ok(EXIT_SUCCESS)
}
