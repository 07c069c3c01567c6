//! The runner replays a transfers CSV against an in-memory ledger seeded from
//! an accounts CSV, and writes the resulting balances to a writer.

mod replay;

pub use replay::{run as replay, ReplaySummary};
