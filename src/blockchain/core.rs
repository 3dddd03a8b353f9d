// core.rs splits the ledger into blocks, chain, link validation and the
// task that owns the node's current chain.
pub mod block;
pub mod chain;
pub mod state;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use state::*;
pub use validation::*;
