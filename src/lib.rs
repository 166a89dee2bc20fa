//! Perforce client credential stores.
//!
//! Two kinds of secrets are cached on the client side: auth tickets
//! (session credentials issued at login) and trust fingerprints (pinned
//! SSL server identities). Both live in the same line-oriented file format
//! the `p4` command line uses, so this crate reads and writes the user's
//! existing `~/.p4tickets` and `~/.p4trust` files directly, with advisory
//! locking and atomic replacement.
//!
//! ```no_run
//! use p4auth::config::AuthConfig;
//! use p4auth::tickets::TicketStore;
//!
//! # fn main() -> p4auth::AuthResult<()> {
//! let tickets = TicketStore::from_config(&AuthConfig::load())?;
//! if let Some(ticket) = tickets.get_value("perforce:1666", Some("bob"))? {
//!     println!("already logged in: {ticket}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod server;
pub mod store;
pub mod tickets;
pub mod trust;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use server::{Protocol, ServerAddress};
pub use store::{AuthEntry, AuthStore, StoreOptions};
pub use tickets::{AuthTicket, TicketStore};
pub use trust::{Fingerprint, TrustStore};
