//! Local query cache.
//!
//! This module provides the `QueryCache` for keeping listing responses on
//! disk between runs. Entries are stored as JSON keyed by query key.
//! Students and invitations are considered stale after 5 minutes, everything
//! else after 20. Mutations invalidate every entry under the affected key
//! prefix.
//!
//! Cached queries:
//! - Students per tenant and page
//! - Invitations per tenant
//! - Phase templates per tenant

pub mod manager;

pub use manager::{stale_minutes_for, CachedData, QueryCache};
