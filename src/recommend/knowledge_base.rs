use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A curated, previously successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl ResolutionRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: Option<&str>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: category.map(str::to_string),
        }
    }
}

const SEED: &[(&str, &str, &str)] = &[
    ("res1", "Reboot the system and check network connectivity.", "Network Problem"),
    ("res2", "Clear browser cache and cookies, then try again.", "Software Issue"),
    ("res3", "Verify user credentials and reset password.", "Account Management"),
    ("res4", "Update graphics drivers to the latest version.", "Software Issue"),
    ("res5", "Check hard drive health using diagnostic tools.", "Hardware Failure"),
    ("res6", "Ensure VPN client is connected and configured correctly.", "Network Problem"),
    ("res7", "Grant necessary file permissions to the application directory.", "Software Issue"),
    ("res8", "Replace faulty RAM modules.", "Hardware Failure"),
    ("res9", "Review firewall rules for blocked ports.", "Network Problem"),
    ("res10", "Escalate to security team for incident investigation.", "Security Incident"),
    ("res11", "Instruct user to check spam folder for activation email.", "Account Management"),
    ("res12", "Perform a clean install of the operating system.", "Software Issue"),
    ("res13", "Check server load and resource utilization.", "Performance Issue"),
    ("res14", "Consult the official documentation for setup instructions.", "Documentation Error"),
    ("res15", "Verify physical cable connections for all devices.", "Hardware Failure"),
];

/// Built-in knowledge base
pub fn seed_records() -> Vec<ResolutionRecord> {
    SEED.iter()
        .map(|(id, text, category)| ResolutionRecord::new(*id, *text, Some(*category)))
        .collect()
}

/// Load the knowledge base from a JSON array file, or the built-in seed
/// records when no path is configured
pub fn load_knowledge_base(path: Option<&Path>) -> Result<Vec<ResolutionRecord>> {
    let records = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                AppError::Configuration(format!(
                    "Failed to read knowledge base {:?}: {}",
                    path, e
                ))
            })?;
            let records: Vec<ResolutionRecord> = serde_json::from_str(&raw)?;
            tracing::info!(path = ?path, records = records.len(), "Knowledge base loaded from file");
            records
        }
        None => seed_records(),
    };

    validate_records(&records)?;
    Ok(records)
}

/// Texts must be non-blank. Duplicate ids are kept; search emits each id once.
pub fn validate_records(records: &[ResolutionRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(AppError::Configuration(
            "Knowledge base is empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.text.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "Resolution {} has empty text",
                record.id
            )));
        }
        if !seen.insert(record.id.as_str()) {
            tracing::warn!(resolution_id = %record.id, "Duplicate resolution id in knowledge base");
        }
    }

    Ok(())
}
