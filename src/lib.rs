pub mod admission;
pub mod compactor;
pub mod config;
pub mod directory;
pub mod driver;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod service;
pub mod wal;
