pub mod sqlite;

pub use sqlite::{RequestRecord, RequestStore};
