//! Concrete [`Provider`](geocode_proxy_core::provider::Provider)
//! implementations.

pub mod google;

pub use google::GoogleGeocoder;
