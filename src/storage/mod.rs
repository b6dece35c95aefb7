pub mod azure;
pub mod csv;
pub mod error;
