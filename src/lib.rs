//! AppMart - app marketplace server
//!
//! Developers upload apps, admins approve them, users download or buy them.
//! Purchases run through a hosted provider checkout; confirmed payments are
//! split 30/70 between platform and developer by the revenue ledger.

pub mod checkout;
pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod reconcile;
pub mod util;
