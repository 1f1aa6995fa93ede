//! Service adapters between handlers and `folio_core`.

pub mod auth;
