//! Helpers shared by feature slices

pub mod pagination;
