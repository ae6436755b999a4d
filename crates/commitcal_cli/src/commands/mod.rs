pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod repos;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod token;

#[cfg(feature = "github")]
pub(crate) mod sync;
