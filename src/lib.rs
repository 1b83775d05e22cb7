//! Affiliate Engine - Coupon Lifecycle & Commission Ledger
//!
//! Core engine for an influencer-affiliate marketplace: campaign
//! eligibility, paired coupon issuance, idempotent redemption ingestion,
//! commission splits, and an append-only ledger gating payout requests.

pub mod codes;
pub mod config;
pub mod domain;
pub mod error;
pub mod facade;
pub mod retry;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::EngineConfig;
pub use error::EngineError;
pub use facade::Engine;
