//! Store Module
//!
//! The shared, volatile key-value mapping.
//!
//! ## Responsibilities
//! - Map string keys to protocol values
//! - Make every command atomic with respect to every other command
//! - Stay at one address for the life of the process (flush clears in place)
//!
//! ## Data Structure Choice
//! A HashMap behind a single RwLock:
//! - Reads (GET/MGET) share the lock
//! - Writes (SET/DEL/FLUSH/MSET) hold it exclusively
//! - Multi-key operations take the lock once, so no partial state is observable

mod table;

pub use table::Store;
