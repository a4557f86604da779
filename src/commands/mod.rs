pub mod check;
pub mod daemon;
pub mod labels;
pub mod query;
