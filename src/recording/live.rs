//! Live view of selected variables and directory candidate listing

use crate::backend::{Connection, NodeRef, ReadStats};
use crate::codec::{decode, describe_type, format_value};
use crate::error::Result;
use crate::types::join_path;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::types::SelectedVariable;

/// Placeholder shown until the first live read
pub const WAITING: &str = "Waiting...";

/// Latest live reading of one selected variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEntry {
    pub label: String,
    pub node_id: String,
    pub live: bool,
    pub value: String,
    pub type_info: String,
    pub access: String,
    pub description: String,
}

impl LiveEntry {
    /// Entry that has not been read yet
    pub fn waiting(variable: &SelectedVariable) -> Self {
        Self {
            label: variable.label.clone(),
            node_id: variable.node_id.clone(),
            live: variable.live,
            value: WAITING.to_string(),
            type_info: WAITING.to_string(),
            access: WAITING.to_string(),
            description: WAITING.to_string(),
        }
    }

    fn unreachable(variable: &SelectedVariable, message: &str) -> Self {
        Self {
            value: format!("Error: {}", message),
            type_info: "Error".to_string(),
            access: "Unknown".to_string(),
            description: "Error".to_string(),
            ..Self::waiting(variable)
        }
    }
}

/// Read value, access rights and description of `variable`
///
/// Each attribute read fails on its own: a failed value read still shows the
/// access rights and description when those succeed.
pub fn read_live_entry(
    connection: &dyn Connection,
    variable: &SelectedVariable,
    stats: &mut ReadStats,
) -> LiveEntry {
    let node = match connection.node(&variable.node_id) {
        Ok(node) => node,
        Err(e) => {
            stats.record_failure();
            return LiveEntry::unreachable(variable, &e.message());
        }
    };

    let mut entry = LiveEntry::waiting(variable);

    let started = Instant::now();
    match node.read_value() {
        Ok(raw) => {
            stats.record_success(started.elapsed());
            let value = decode(&raw);
            entry.value = format_value(&value);
            entry.type_info = describe_type(&value);
        }
        Err(e) => {
            stats.record_failure();
            entry.value = format!("Error: {}", e.message());
            entry.type_info = "Error".to_string();
        }
    }

    entry.access = match node.access_level() {
        Ok(access) => access.to_string(),
        Err(e) => {
            tracing::debug!("Access level of {} unreadable: {}", variable.node_id, e);
            "Unknown".to_string()
        }
    };

    entry.description = match node.description() {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => "No description".to_string(),
        Err(e) => {
            tracing::debug!("Description of {} unreadable: {}", variable.node_id, e);
            "Error".to_string()
        }
    };

    entry
}

/// A variable child of the browsed directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCandidate {
    /// `<directory>/<display name>`
    pub label: String,
    pub node_id: String,
    /// Initial value and type, or why it could not be read
    pub tooltip: String,
}

/// List the direct variable children of a directory node
///
/// Children whose class cannot be read are skipped; a failure to enumerate
/// the children is returned to the caller.
pub fn list_directory_candidates(
    connection: &dyn Connection,
    directory_path: &str,
    directory_node_id: &str,
) -> Result<Vec<DirectoryCandidate>> {
    let directory = connection.node(directory_node_id)?;
    let children = directory.children()?;

    let mut candidates = Vec::new();
    for child in children {
        match child.node_class() {
            Ok(class) if class.is_variable() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Skipping child {} of {}: {}", child.node_id(), directory_path, e);
                continue;
            }
        }
        let name = child.display_name().unwrap_or_else(|_| child.node_id());
        candidates.push(DirectoryCandidate {
            label: join_path(directory_path, &name),
            node_id: child.node_id(),
            tooltip: candidate_tooltip(&child),
        });
    }
    tracing::debug!(
        "Directory {} has {} variable(s)",
        directory_path,
        candidates.len()
    );
    Ok(candidates)
}

fn candidate_tooltip(node: &NodeRef) -> String {
    match node.read_value() {
        Ok(raw) => {
            let value = decode(&raw);
            format!(
                "Current Value: {}\nType: {}",
                format_value(&value),
                describe_type(&value)
            )
        }
        Err(_) => "Could not read initial value".to_string(),
    }
}
