//! Command handlers, one module per CLI verb group.

pub(crate) mod devices;
pub(crate) mod link;
pub(crate) mod payload;
pub(crate) mod scan;
