//! Conflict detection and resolution policy.
//!
//! Quill is last-writer-wins with a human override: when a remote write lands
//! under an active editor, the system never merges automatically. The editor
//! is shown the divergence and picks a resolution: keep the local buffer,
//! adopt the server version, or hand-edit a merge buffer seeded with both
//! versions. Collision rates are low for single-document, small-team
//! editing, and a wrong automatic merge costs more than a prompt.

use serde::{Deserialize, Serialize};

/// Heading inserted above the editor's local version in a manual-merge seed.
pub const MERGE_LOCAL_HEADING: &str = "===== Your version =====";

/// Heading inserted above the server version in a manual-merge seed.
pub const MERGE_SERVER_HEADING: &str = "===== Server version =====";

/// Returns `true` if remote content genuinely diverges from the local buffer.
///
/// Comparison trims leading/trailing whitespace first, so a remote write that
/// only re-flows surrounding whitespace is not reported as a conflict. Known
/// limitation: an intentional whitespace-only edit is masked as "no change"
/// and silently wins in read-only views.
pub fn content_differs(local: &str, remote: &str) -> bool {
    local.trim() != remote.trim()
}

/// The editor's choice when a conflicting remote write was detected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local in-progress buffer, discarding the remote write.
    KeepLocal,
    /// Adopt the server's version, discarding local edits.
    KeepServer,
    /// Persist a hand-edited merge buffer.
    Manual { merged: String },
}

impl ConflictResolution {
    /// Short name for logging (avoids dumping a manual merge buffer).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepServer => "keep_server",
            Self::Manual { .. } => "manual",
        }
    }
}

/// Compute the content to persist for a chosen resolution.
pub fn resolved_content(
    resolution: &ConflictResolution,
    local: &str,
    server: &str,
) -> String {
    match resolution {
        ConflictResolution::KeepLocal => local.to_string(),
        ConflictResolution::KeepServer => server.to_string(),
        ConflictResolution::Manual { merged } => merged.clone(),
    }
}

/// Build the starting buffer for a manual merge: both versions concatenated
/// under labeled headings, left for the user to hand-edit.
pub fn merge_seed(local: &str, server: &str) -> String {
    format!("{MERGE_LOCAL_HEADING}\n{local}\n\n{MERGE_SERVER_HEADING}\n{server}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Divergence detection
    // -----------------------------------------------------------------------

    #[test]
    fn identical_content_does_not_differ() {
        assert!(!content_differs("hello", "hello"));
    }

    #[test]
    fn whitespace_only_difference_is_ignored() {
        assert!(!content_differs("  hello\n", "hello"));
        assert!(!content_differs("hello", "\thello  \n\n"));
    }

    #[test]
    fn real_divergence_is_detected() {
        assert!(content_differs("hello", "goodbye"));
        assert!(content_differs("", "something"));
    }

    #[test]
    fn interior_whitespace_still_counts() {
        // Only the edges are trimmed.
        assert!(content_differs("a b", "a  b"));
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn keep_local_persists_exactly_local() {
        let out = resolved_content(&ConflictResolution::KeepLocal, "mine", "theirs");
        assert_eq!(out, "mine");
    }

    #[test]
    fn keep_server_persists_exactly_server() {
        let out = resolved_content(&ConflictResolution::KeepServer, "mine", "theirs");
        assert_eq!(out, "theirs");
    }

    #[test]
    fn manual_persists_the_edited_buffer() {
        let resolution = ConflictResolution::Manual {
            merged: "hand-merged".to_string(),
        };
        let out = resolved_content(&resolution, "mine", "theirs");
        assert_eq!(out, "hand-merged");
    }

    #[test]
    fn merge_seed_carries_both_labeled_versions() {
        let seed = merge_seed("mine", "theirs");
        assert!(seed.contains(MERGE_LOCAL_HEADING));
        assert!(seed.contains(MERGE_SERVER_HEADING));
        assert!(seed.contains("mine"));
        assert!(seed.contains("theirs"));
        // Local version comes first.
        assert!(seed.find("mine").unwrap() < seed.find("theirs").unwrap());
    }

    #[test]
    fn resolution_serialization_is_tagged() {
        let json = serde_json::to_string(&ConflictResolution::KeepLocal).unwrap();
        assert_eq!(json, r#"{"resolution":"keep_local"}"#);

        let manual: ConflictResolution =
            serde_json::from_str(r#"{"resolution":"manual","merged":"x"}"#).unwrap();
        assert_eq!(manual, ConflictResolution::Manual { merged: "x".into() });
    }
}
