//! Nullness propagation: lattice, store, transfer function, and analysis facade.

pub(crate) mod analysis;
pub(crate) mod annotations;
pub(crate) mod store;
pub(crate) mod tables;
pub(crate) mod transfer;
pub(crate) mod value;
