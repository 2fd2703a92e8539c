//! Typed codecs for the metadata chunks
//!
//! One module per chunk type. Each codec owns its byte layout end to end:
//! `parse` decodes the raw chunk content into a typed struct, `render` (for
//! the writable chunks) produces the exact bytes to store, and the read-only
//! legacy codecs project straight onto a [`CartData`](crate::data::CartData).

pub(crate) mod air1;
pub(crate) mod av10;
pub mod bext;
pub mod cart;
pub mod fmt;
pub mod levl;
pub(crate) mod list;
pub mod mext;
pub(crate) mod rdxl;
pub mod scot;
