//! Authoritative match server for Contrast.
//!
//! One game at a time, exactly one X and one O across all connections,
//! spectators welcome. Every accepted mutation is followed by a broadcast
//! snapshot, and every rejection that could leave a client stale is
//! answered with an authoritative STATE resync.

pub mod net;
pub mod server;
pub mod session;

pub use server::Server;
pub use session::Role;
