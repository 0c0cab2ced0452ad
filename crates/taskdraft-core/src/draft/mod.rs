//! Draft persistence: codec, validation, registry and the store itself.

pub mod codec;
pub mod registry;
pub mod store;
pub mod validator;

pub use codec::DraftCodec;
pub use registry::PersistenceRegistry;
pub use store::DraftStore;
