//! Remote-change detection for an active editor.
//!
//! [`ChangeWatcher`] is the per-session filter over the event bus: it watches
//! one document on behalf of one editing user and decides which content
//! events constitute a genuine external change. It never mutates the edit
//! buffer itself: the editor is notified and must resolve, so local edits
//! are never silently lost.
//!
//! The watcher is a synchronous state machine; the session task drives it
//! from its bus subscription.

use quill_core::conflict::content_differs;
use quill_core::types::{DbId, Timestamp};

use crate::bus::{DocumentEvent, DocumentEventKind};

/// A remote write that diverged from the editor's local buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChange {
    pub document_id: DbId,
    pub content: String,
    pub updated_at: Timestamp,
    pub actor_user_id: DbId,
}

/// Watches one document's content events for one editing user.
pub struct ChangeWatcher {
    document_id: DbId,
    user_id: DbId,
    /// The content the editor currently sees (stored baseline plus any
    /// snapshot of unsaved edits the client has pushed).
    local_content: String,
    /// Swallow the first observed notification. Subscription transports
    /// that replay the current state on subscribe would otherwise report the
    /// content the client itself just loaded as an external change.
    skip_initial: bool,
}

impl ChangeWatcher {
    pub fn new(
        document_id: DbId,
        user_id: DbId,
        local_content: String,
        skip_initial: bool,
    ) -> Self {
        Self {
            document_id,
            user_id,
            local_content,
            skip_initial,
        }
    }

    /// Update the watcher's view of the local buffer (from an `edit.snapshot`
    /// pushed by the client).
    pub fn update_local_content(&mut self, content: String) {
        self.local_content = content;
    }

    /// The content the watcher currently compares against.
    pub fn local_content(&self) -> &str {
        &self.local_content
    }

    /// Feed one bus event through the watcher.
    ///
    /// Returns a [`RemoteChange`] only when all of the following hold: the
    /// event is a content update for the watched document, it is not the
    /// initial replayed snapshot, it was not written by the watching user
    /// (own writes refresh the baseline instead, suppressing the echo), and the
    /// incoming content differs from the local buffer after whitespace
    /// trimming.
    pub fn observe(&mut self, event: &DocumentEvent) -> Option<RemoteChange> {
        if event.document_id != self.document_id {
            return None;
        }
        let (content, updated_at) = match &event.kind {
            DocumentEventKind::ContentUpdated {
                content,
                updated_at,
            } => (content, *updated_at),
            _ => return None,
        };

        if self.skip_initial {
            self.skip_initial = false;
            return None;
        }

        if event.actor_user_id == self.user_id {
            // Echo of our own write: the stored state caught up with the
            // editor, so the comparison baseline moves forward.
            self.local_content = content.clone();
            return None;
        }

        if !content_differs(&self.local_content, content) {
            return None;
        }

        Some(RemoteChange {
            document_id: self.document_id,
            content: content.clone(),
            updated_at,
            actor_user_id: event.actor_user_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DocumentEvent;

    const DOC: DbId = 10;
    const EDITOR: DbId = 1;
    const OTHER: DbId = 2;

    fn content_event(document_id: DbId, actor: DbId, content: &str) -> DocumentEvent {
        DocumentEvent::content_updated(document_id, 1, actor, content.to_string(), chrono::Utc::now())
    }

    #[test]
    fn reports_divergent_remote_write() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), false);

        let change = watcher.observe(&content_event(DOC, OTHER, "bar"));

        let change = change.expect("divergence must be reported");
        assert_eq!(change.content, "bar");
        assert_eq!(change.actor_user_id, OTHER);
        // The local buffer is untouched; resolution is the editor's call.
        assert_eq!(watcher.local_content(), "foo");
    }

    #[test]
    fn skip_initial_swallows_first_snapshot_only() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), true);

        assert!(watcher.observe(&content_event(DOC, OTHER, "bar")).is_none());
        assert!(watcher.observe(&content_event(DOC, OTHER, "baz")).is_some());
    }

    #[test]
    fn own_writes_are_suppressed_and_advance_the_baseline() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), false);

        assert!(watcher.observe(&content_event(DOC, EDITOR, "foo v2")).is_none());
        assert_eq!(watcher.local_content(), "foo v2");

        // A remote write matching the new baseline is not a conflict.
        assert!(watcher.observe(&content_event(DOC, OTHER, "foo v2")).is_none());
    }

    #[test]
    fn whitespace_only_difference_is_not_a_conflict() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), false);

        assert!(watcher.observe(&content_event(DOC, OTHER, "  foo\n")).is_none());
    }

    #[test]
    fn other_documents_are_ignored() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), false);

        assert!(watcher.observe(&content_event(DOC + 1, OTHER, "bar")).is_none());
    }

    #[test]
    fn non_content_events_are_ignored() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "foo".into(), false);

        let event = DocumentEvent::new(DOC, 1, OTHER, DocumentEventKind::LockReleased);
        assert!(watcher.observe(&event).is_none());
    }

    #[test]
    fn snapshot_updates_change_the_comparison_baseline() {
        let mut watcher = ChangeWatcher::new(DOC, EDITOR, "stored".into(), false);

        // The editor types without saving; the client pushes the buffer.
        watcher.update_local_content("stored plus unsaved".into());

        // Remote write equal to the *stored* content still differs from the
        // buffer, so it must be reported.
        assert!(watcher.observe(&content_event(DOC, OTHER, "stored")).is_some());
    }
}
