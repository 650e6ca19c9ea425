//! Core business logic abstractions

pub mod analysis;
pub mod cache;
pub mod config;
pub mod dates;
pub mod log;
pub mod price;
pub mod rates;
pub mod reconcile;

// Re-export main types for cleaner imports
pub use cache::PriceStore;
pub use price::{FundSeries, PricePoint};
pub use rates::{FundRatesSource, RatesPayload};
pub use reconcile::{Attempt, Reconciler};
