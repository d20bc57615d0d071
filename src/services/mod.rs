pub mod commerce;
pub mod dashboard;
pub mod orders;
