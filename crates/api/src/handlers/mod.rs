pub mod collaboration;
pub mod documents;
