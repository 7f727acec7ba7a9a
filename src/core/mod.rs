//! Core business logic abstractions

pub mod code;
pub mod config;
pub mod log;
pub mod price;
pub mod sync;
pub mod table;
pub mod writeback;

// Re-export main types for cleaner imports
pub use code::{CodeCell, CodeKind, CodeTarget, classify};
pub use price::{FundPriceProvider, PriceResolver, Quote, QuoteError, StockPriceProvider};
pub use table::{Record, RecordStore, RecordUpdate, SearchQuery, TableError};
