//! Bus ridership analytics: aggregation, line groups, operational actions
//! and before/after impact windows.

pub mod action_ledger;
pub mod config;
pub mod error;
pub mod export;
pub mod group_registry;
pub mod impact;
pub mod ingest;
pub mod line_detail;
pub mod ranking;
pub mod repository;
pub mod ridership;
pub mod session;
pub mod store;
pub mod types;
