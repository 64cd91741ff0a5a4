pub mod registry;
pub mod schedule;
pub mod supervisor;
