mod block;
mod pool;

pub use block::Block;
pub use pool::{BlockPool, PoolMetricsSnapshot};
