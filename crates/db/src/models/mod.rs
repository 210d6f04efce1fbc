pub mod collaboration;
pub mod document;
