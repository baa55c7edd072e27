//! Types that cross the boundary between the preprocessing backend and the
//! viewer: the metadata record, the chunk blob framing, and the error kind
//! tag attached to failures.

pub mod blob;
pub mod error;
pub mod metadata;
