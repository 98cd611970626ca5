// Concrete implementations for external systems: file storage and the CSV table format.

pub mod storage;
pub mod tabular;

pub use storage::LocalStorage;
pub use tabular::Table;
