//! Application services layer.

pub mod error;
pub mod hooks;
pub mod lookup;
pub mod repos;
pub mod stock_sync;
