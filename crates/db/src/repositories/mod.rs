mod collaboration_repo;
mod document_repo;

pub use collaboration_repo::{DocumentLockRepo, PresenceRepo};
pub use document_repo::DocumentRepo;
