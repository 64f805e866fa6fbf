//! CLI presentation: tables, event lines and policy summaries.

use crate::capture::CapturedState;
use crate::error::{ApiError, StorageError};
use crate::relay::{EventEnvelope, ShellEvent};
use crate::security::SecurityPolicy;
use chrono::{TimeZone, Utc};
use comfy_table::Table;
use owo_colors::OwoColorize;

fn json_error(e: serde_json::Error) -> ApiError {
    ApiError::StorageError(StorageError::Corrupt(e.to_string()))
}

fn format_timestamp(millis: u64) -> String {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Captured states as a table (text) or an array (json).
pub fn format_states(states: &[CapturedState], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return serde_json::to_string_pretty(states).map_err(json_error);
    }
    if states.is_empty() {
        return Ok("No captured states".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Flow", "Page", "URL", "Anchor", "Index", "Rev", "Captured"]);
    for state in states {
        let anchor = state
            .anchor
            .as_ref()
            .map(|a| a.to_hex()[..12].to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            state.key.flow_id.to_string(),
            state.key.page_id.to_string(),
            state.url.clone(),
            anchor,
            state.navigation.history_index.to_string(),
            state.revision.to_string(),
            format_timestamp(state.captured_at),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_state_json(state: &CapturedState) -> Result<String, ApiError> {
    serde_json::to_string_pretty(state).map_err(json_error)
}

/// One relay event as a terminal line.
pub fn format_event_line(envelope: &EventEnvelope, color: bool) -> String {
    let event = &envelope.event;
    let view = format!("{}:{}", event.flow_id(), event.page_id());
    let detail = match event {
        ShellEvent::UrlUpdated { url, .. } => url.clone(),
        ShellEvent::TitleUpdated { title, .. } => format!("\"{}\"", title),
        ShellEvent::RestoreResult {
            method,
            success,
            message,
            ..
        } => match message {
            Some(message) => format!("method={} success={} ({})", method, success, message),
            None => format!("method={} success={}", method, success),
        },
        ShellEvent::Interstitial {
            decision_id,
            kind,
            url,
            error,
            ..
        } => match error {
            Some(error) => format!("#{} {} {} [{}]", decision_id, kind, url, error),
            None => format!("#{} {} {}", decision_id, kind, url),
        },
        ShellEvent::DecisionResolved {
            decision_id,
            resolution,
            ..
        } => format!("#{} {}", decision_id, resolution),
    };

    let kind = event.event_type();
    if !color {
        return format!("[{}] {} {} {}", envelope.seq, kind, view, detail);
    }
    let kind = match event {
        ShellEvent::Interstitial { .. } => kind.red().bold().to_string(),
        ShellEvent::RestoreResult { success: false, .. } => kind.yellow().to_string(),
        ShellEvent::RestoreResult { .. } | ShellEvent::DecisionResolved { .. } => {
            kind.green().to_string()
        }
        _ => kind.cyan().to_string(),
    };
    format!("[{}] {} {} {}", envelope.seq.dimmed(), kind, view.bold(), detail)
}

/// How the policy would treat a navigation to `url`.
pub fn format_check_result(url: &str, policy: &SecurityPolicy) -> String {
    match policy.blocked_domain_for(url) {
        Some(domain) => format!(
            "{}: blocked authentication domain ({}); requires open_external or go_back",
            url, domain
        ),
        None => format!("{}: allowed", url),
    }
}
