#[macro_use]
pub(crate) mod index;

pub(crate) mod data_structures;
pub(crate) mod error;
pub(crate) mod ids;
pub(crate) mod time;
pub(crate) mod wrapped;

pub use data_structures::{Map, Set};
pub use wrapped::WrappedRcRefCell;
