//! DS-record probing against public resolvers.
//!
//! - [`pool`] picks distinct resolver endpoints at random.
//! - [`wire`] speaks the DNS wire protocol to one resolver.
//! - [`consensus`] asks two resolvers and reconciles their answers.

pub mod consensus;
pub mod error;
pub mod pool;
pub mod query;
pub mod wire;

pub use consensus::ConsensusChecker;
pub use error::{CheckError, Error, QueryError};
pub use pool::{ResolverPool, ShuffledPool};
pub use query::{DsAnswer, DsQuerier};
pub use wire::WireQuerier;
