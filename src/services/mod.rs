pub mod reporting;
pub mod training;
