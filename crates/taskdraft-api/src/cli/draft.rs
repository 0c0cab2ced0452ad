//! Draft store subcommands: save, load, remove, list, cleanup, purge, info.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use taskdraft_types::draft::{DraftMetadata, StorageKey};
use taskdraft_types::form::FormData;
use tokio::io::AsyncReadExt;

use super::DraftTarget;
use crate::state::AppState;

/// Optional scope filter for `list`.
#[derive(Debug, Default)]
pub struct ListFilter {
    pub course: Option<String>,
    pub lesson: Option<String>,
    pub user: Option<String>,
}

impl ListFilter {
    fn matches(&self, key: &StorageKey) -> bool {
        self.course.as_deref().is_none_or(|c| c == key.course_id)
            && self.lesson.as_deref().is_none_or(|l| l == key.lesson_id)
            && self.user.as_deref().is_none_or(|u| u == key.user_id)
    }
}

fn resolve_key(state: &AppState, target: &DraftTarget) -> StorageKey {
    state.store.key(
        target.form_type.clone(),
        &target.course,
        &target.lesson,
        target.user.as_deref(),
    )
}

async fn read_payload(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read form payload from stdin")?;
            Ok(buf)
        }
    }
}

/// Validate and persist a form payload.
pub async fn save(state: &AppState, target: &DraftTarget, file: Option<&Path>, json: bool) -> Result<()> {
    let key = resolve_key(state, target);
    let raw = read_payload(file).await?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("form payload is not valid JSON")?;

    let saved_at = state
        .store
        .save(&key, &FormData::new(value))
        .await
        .context("draft was not saved")?;
    let raw_key = state.store.render_key(&key);

    if json {
        let result = serde_json::json!({
            "key": raw_key,
            "saved_at": saved_at,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Saved draft '{}' at {}",
            style("ok").green(),
            style(&raw_key).cyan(),
            saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        println!();
    }

    Ok(())
}

/// Print a stored draft, if any.
pub async fn load(state: &AppState, target: &DraftTarget, json: bool) -> Result<()> {
    let key = resolve_key(state, target);
    let raw_key = state.store.render_key(&key);
    let loaded = state.store.load(&key).await?;

    match loaded {
        Some(draft) => {
            if json {
                let result = serde_json::json!({
                    "key": raw_key,
                    "saved_at": draft.saved_at,
                    "data": draft.payload,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
                println!(
                    "  {} ({})",
                    style(&raw_key).cyan().bold(),
                    style(format_relative_time(&draft.saved_at, Utc::now())).dim(),
                );
                println!();
                println!("{}", serde_json::to_string_pretty(&draft.payload)?);
                println!();
            }
        }
        None => {
            if json {
                let result = serde_json::json!({
                    "key": raw_key,
                    "data": null,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
                println!(
                    "  {} No draft stored under '{}'",
                    style("i").blue().bold(),
                    style(&raw_key).cyan(),
                );
                println!();
            }
        }
    }

    Ok(())
}

/// Delete one draft.
pub async fn remove(state: &AppState, target: &DraftTarget, json: bool) -> Result<()> {
    let key = resolve_key(state, target);
    let raw_key = state.store.render_key(&key);

    if !state.store.remove(&key).await {
        bail!("storage refused to delete '{raw_key}'");
    }

    if json {
        let result = serde_json::json!({ "deleted": raw_key });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!("  {} Deleted draft '{}'", style("ok").green(), style(&raw_key).cyan());
        println!();
    }

    Ok(())
}

/// List drafts known to the registry.
pub fn list(state: &AppState, filter: &ListFilter, json: bool) -> Result<()> {
    let namespace = &state.store.config().namespace;
    let drafts: Vec<(DraftMetadata, StorageKey)> = state
        .store
        .registry()
        .list()
        .into_iter()
        .filter_map(|meta| {
            let key = StorageKey::parse(namespace, &meta.key)?;
            filter.matches(&key).then_some((meta, key))
        })
        .collect();

    if json {
        let items: Vec<_> = drafts
            .iter()
            .map(|(meta, key)| {
                serde_json::json!({
                    "key": meta.key,
                    "form_type": key.form_type,
                    "course_id": key.course_id,
                    "lesson_id": key.lesson_id,
                    "user_id": key.user_id,
                    "saved_at": meta.saved_at,
                    "version": meta.format_version,
                })
            })
            .collect();
        let result = serde_json::json!({
            "drafts": items,
            "count": drafts.len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if drafts.is_empty() {
        println!();
        println!("  {} No drafts stored.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    println!("  Drafts ({} entries)", drafts.len());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Type").fg(Color::White),
        Cell::new("Course").fg(Color::White),
        Cell::new("Lesson").fg(Color::White),
        Cell::new("User").fg(Color::White),
        Cell::new("Saved").fg(Color::White),
    ]);

    let now = Utc::now();
    for (meta, key) in &drafts {
        table.add_row(vec![
            Cell::new(key.form_type.as_str()).fg(Color::Cyan),
            Cell::new(&key.course_id),
            Cell::new(&key.lesson_id),
            Cell::new(&key.user_id).fg(Color::DarkGrey),
            Cell::new(format_relative_time(&meta.saved_at, now)).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

/// Evict every unusable draft.
pub async fn cleanup(state: &AppState, json: bool) -> Result<()> {
    let removed = state.store.cleanup_expired().await;

    if json {
        let result = serde_json::json!({ "removed": removed });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Removed {} expired or unreadable draft{}",
            style("ok").green(),
            removed,
            if removed == 1 { "" } else { "s" },
        );
        println!();
    }

    Ok(())
}

/// Delete every draft of a course/lesson scope.
pub async fn purge(
    state: &AppState,
    course: &str,
    lesson: &str,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = user
        .filter(|u| !u.is_empty())
        .unwrap_or(&state.store.config().anonymous_user);
    let removed = state.store.remove_scope(course, lesson, user).await;

    if json {
        let result = serde_json::json!({
            "course_id": course,
            "lesson_id": lesson,
            "user_id": user,
            "removed": removed,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "  {} Purged {} draft{} for course '{}' lesson '{}'",
            style("ok").green(),
            removed,
            if removed == 1 { "" } else { "s" },
            style(course).cyan(),
            style(lesson).cyan(),
        );
        println!();
    }

    Ok(())
}

/// Show storage usage.
pub async fn info(state: &AppState, json: bool) -> Result<()> {
    let info = state.store.storage_info().await;

    if json {
        let mut result = serde_json::to_value(&info)?;
        result["usage_percent"] = serde_json::json!(info.usage_percent());
        result["data_dir"] = serde_json::json!(state.data_dir.display().to_string());
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let check_mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!("  {} Storage available", check_mark(info.available));
    println!(
        "  Used:     {} of {} ({:.1}%)",
        format_size(info.used_bytes),
        format_size(info.ceiling_bytes),
        info.usage_percent(),
    );
    println!("  Drafts:   {}", info.draft_count);
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!();

    Ok(())
}

fn format_relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else {
        format!("{}d ago", diff.num_days())
    }
}

/// Format bytes into a human-readable size string.
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
