//! Forensic Audit Logging
//!
//! Structured `tracing` events for chain of custody on the `forensic_audit`
//! target. They mirror the per-case `journal.log` with machine-readable
//! fields; the subscriber adds the timestamp.

use std::path::Path;

use tracing::{info, warn};

use super::hash::{VerificationStatus, ALGORITHM};
use crate::case::EvidenceItem;

/// Log an activity journal entry
pub fn log_journal_entry(case: &str, action: &str, message: &str, sha256: Option<&str>) {
    info!(
        target: "forensic_audit",
        operation = "journal",
        case = case,
        action = action,
        message = message,
        sha256 = sha256.unwrap_or("none"),
        "Activity recorded"
    );
}

/// Log an external tool invocation and its exit status
pub fn log_tool_invocation(tool: &str, command_line: &str, status: &str) {
    info!(
        target: "forensic_audit",
        operation = "external_tool",
        tool = tool,
        command = command_line,
        status = status,
        "External tool finished"
    );
}

/// Log evidence registration with its acquisition hash
pub fn log_evidence_registered(case: &str, item: &EvidenceItem) {
    info!(
        target: "forensic_audit",
        operation = "evidence_registered",
        case = case,
        evidence_id = %item.id,
        kind = item.kind.as_str(),
        platform = item.platform.as_str(),
        path = %item.relative_path,
        sha256 = %item.sha256,
        size = item.size,
        "Evidence registered"
    );
}

/// Log the re-hash of one registered item; anything but a match is a warning
pub fn log_hash_verification(case: &str, item: &EvidenceItem, status: &VerificationStatus) {
    match status {
        VerificationStatus::Verified => info!(
            target: "forensic_audit",
            operation = "hash_verification",
            case = case,
            evidence_id = %item.id,
            algorithm = ALGORITHM,
            status = status.as_str(),
            "Evidence verified"
        ),
        VerificationStatus::Mismatch { computed } => warn!(
            target: "forensic_audit",
            operation = "hash_verification",
            case = case,
            evidence_id = %item.id,
            algorithm = ALGORITHM,
            expected_hash = %item.sha256,
            computed_hash = %computed,
            status = status.as_str(),
            "Evidence digest changed since acquisition"
        ),
        VerificationStatus::Missing => warn!(
            target: "forensic_audit",
            operation = "hash_verification",
            case = case,
            evidence_id = %item.id,
            path = %item.relative_path,
            status = status.as_str(),
            "Evidence file missing"
        ),
    }
}

/// Log report generation
pub fn log_report_generation(case: &str, format: &str, output_path: &Path) {
    info!(
        target: "forensic_audit",
        operation = "report_generation",
        case = case,
        format = format,
        output_path = %output_path.display(),
        "Case report generated"
    );
}

/// Log security event (blocked operation, validation failure, etc.)
pub fn log_security_event(event_type: &str, description: &str, path: Option<&Path>) {
    warn!(
        target: "forensic_audit",
        event_type = "security",
        security_event = event_type,
        description = description,
        path = path.map(|p| p.display().to_string()).unwrap_or_default(),
        "Security event"
    );
}

/// Log a file copied out of the case tree
pub fn log_data_export(source: &Path, destination: &Path, bytes_exported: u64) {
    info!(
        target: "forensic_audit",
        operation = "data_export",
        source = %source.display(),
        destination = %destination.display(),
        bytes_exported = bytes_exported,
        "Evidence data exported"
    );
}
