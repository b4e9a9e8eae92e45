//! Exchange capability and its Bybit implementation.

mod auth;
mod bybit_client;
mod exchange;
mod types;

pub use bybit_client::{BybitClient, REQUEST_TIMEOUT};
pub use exchange::{ExchangeClient, RawPosition};
