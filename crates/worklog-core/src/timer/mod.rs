mod catalog;
mod tracker;

pub use catalog::TimerCatalog;
pub use tracker::{SessionTracker, StopSummary};
