pub mod actor;
pub mod correlation;
