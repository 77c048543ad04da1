//! Configuration: the live mapping, its persisted store and the codec between them.

pub mod codec;
pub mod configuration;
pub mod literal;
pub mod store;

pub use codec::{ReloadReport, SaveReport, reload, save};
pub use configuration::{ConfigSection, Configuration};
pub use literal::{LiteralParser, ensure_literal, to_literal};
pub use store::{ConfigStore, MemoryStore, SharedStore, TomlStore, shared};
