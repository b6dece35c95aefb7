pub mod address;
pub mod station;
