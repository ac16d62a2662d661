pub mod engine;
pub mod error;
pub mod health;
pub mod logger;
pub mod manager;
pub mod pool;
pub mod router;
pub mod transaction;

pub use engine::*;
pub use error::*;
pub use health::{check_all, probe, HealthMonitor, HealthStatus};
pub use logger::*;
pub use manager::*;
pub use pool::*;
pub use router::*;
pub use transaction::*;
