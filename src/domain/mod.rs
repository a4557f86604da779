pub mod evaluator;
pub mod labels;
pub mod launcher;
pub mod monitor_service;
pub mod node;
pub mod registry;
pub mod types;
pub mod verdict;
