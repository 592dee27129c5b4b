//! Output formatting - plain ASCII terminal output, or JSON with `--json`

use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;

use shopdesk_common::catalog;
use shopdesk_common::status::tone_for;
use shopdesk_common::totals::format_cents;
use shopdesk_common::{Badge, BulkReport, ColorTier, Entity, EntityKind, StatusEvent, Tone};

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Color a status label by its tone
pub fn paint_tone(text: &str, tone: Tone) -> String {
    match tone {
        Tone::Gray => text.dimmed().to_string(),
        Tone::Warning => text.yellow().to_string(),
        Tone::Info => text.cyan().to_string(),
        Tone::Primary => text.blue().to_string(),
        Tone::Success => text.bright_green().to_string(),
        Tone::Danger => text.bright_red().to_string(),
    }
}

fn paint_status(entity: &Entity) -> Option<String> {
    let status = entity.status.as_deref()?;
    let painted = catalog::schema(entity.kind)
        .lifecycle
        .and_then(|lc| tone_for(lc, status))
        .map(|tone| paint_tone(status, tone))
        .unwrap_or_else(|| status.to_string());
    Some(painted)
}

fn on_flags(entity: &Entity) -> String {
    let on: Vec<&str> = entity
        .flags
        .iter()
        .filter(|(_, v)| **v)
        .map(|(k, _)| k.as_str())
        .collect();
    if on.is_empty() {
        "-".to_string()
    } else {
        on.join(",")
    }
}

/// One-line summary used by `list`
pub fn entity_line(entity: &Entity) -> String {
    let scope = entity
        .scope_id
        .map(|s| format!("scope {}", s))
        .unwrap_or_else(|| "unscoped".to_string());
    let mut line = format!(
        "{:<6} {:<14} {:<10} {}",
        entity.id.to_string(),
        entity.kind.as_str(),
        scope,
        on_flags(entity)
    );
    if let Some(status) = paint_status(entity) {
        line.push_str("  ");
        line.push_str(&status);
    }
    line
}

/// Full entity view used by `show` and mutating commands
pub fn print_entity(entity: &Entity) {
    println!("{} {}", entity.kind.to_string().bold(), entity.id);
    if let Some(scope) = entity.scope_id {
        println!("  scope:    {}", scope);
    }
    if let Some(status) = paint_status(entity) {
        println!("  status:   {}", status);
    }
    for (name, value) in &entity.flags {
        let mark = if *value { "[x]".bright_green().to_string() } else { "[ ]".dimmed().to_string() };
        println!("  {} {}", mark, name);
    }
    for (field, at) in &entity.stamps {
        println!("  {:<13} {}", format!("{}:", field), at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "  {}",
        format!("version {} * updated {}", entity.version, entity.updated_at.format("%Y-%m-%d %H:%M:%S"))
            .dimmed()
    );
}

pub fn print_entities(entities: &[Entity]) {
    if entities.is_empty() {
        println!("{}", "No entities".dimmed());
        return;
    }
    for entity in entities {
        println!("{}", entity_line(entity));
    }
}

pub fn badge_text(badge: &Badge) -> String {
    let label = badge.label.as_deref().unwrap_or("-");
    match badge.tier {
        ColorTier::Full => label.bright_green().to_string(),
        ColorTier::Partial => label.yellow().to_string(),
        ColorTier::None => label.dimmed().to_string(),
    }
}

pub fn print_badge(kind: EntityKind, flag: &str, badge: &Badge) {
    println!("{} {}: {} ({})", kind, flag, badge_text(badge), badge.tier.as_str());
}

pub fn print_summary(kind: EntityKind, summary: &BTreeMap<String, u64>) {
    println!("{}", format!("[{}]", kind.as_str().to_uppercase()).bold());
    if summary.is_empty() {
        println!("  {}", "empty".dimmed());
    }
    let lifecycle = catalog::schema(kind).lifecycle;
    for (status, count) in summary {
        let painted = lifecycle
            .and_then(|lc| tone_for(lc, status))
            .map(|tone| paint_tone(status, tone))
            .unwrap_or_else(|| status.clone());
        // Pad on the raw text; escape codes would skew the width
        let pad = " ".repeat(14usize.saturating_sub(status.len()));
        println!("  {}{}{}", painted, pad, count);
    }
}

pub fn print_bulk(report: &BulkReport) {
    let header = format!("Bulk update ({}): {} updated", report.mode.as_str(), report.updated.len());
    if report.is_complete() {
        println!("{}", header.bright_green());
        return;
    }
    println!("{}", header.yellow());
    for id in &report.missing {
        println!("  {} {}", "[MISSING]".bright_red(), id);
    }
    for rejection in &report.rejected {
        println!("  {} {} {}", "[REJECTED]".bright_red(), rejection.id, rejection.message);
    }
}

pub fn print_events(events: &[StatusEvent]) {
    if events.is_empty() {
        println!("{}", "No events recorded".dimmed());
        return;
    }
    for event in events {
        println!(
            "{}  {:<6} {:<12} {:<24} {}",
            event.at.format("%Y-%m-%d %H:%M:%S").dimmed(),
            event.entity_id.to_string(),
            event.kind.as_str(),
            event.action.as_str().cyan(),
            event.detail
        );
    }
}

pub fn print_total(total: u64) {
    println!("Total: {}", format_cents(total).bold());
}
