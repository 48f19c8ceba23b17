//! Instrument bus implementations and drivers.
//!
//! The bus side ([`VisaBus`], [`MockBus`]) implements the transport-agnostic
//! [`crate::core::ScpiBus`] capability; the driver side ([`Sr865`],
//! [`E5080b`]) owns the command vocabulary of one instrument and exposes
//! typed operations to the session controllers.

pub mod e5080b;
pub mod mock;
pub mod sr865;
pub mod visa;

pub use e5080b::E5080b;
pub use mock::MockBus;
pub use sr865::{LockinOutputs, Sr865};
pub use visa::VisaBus;
