//! Booking & availability core. Route handlers call into these modules with
//! an explicit [`Actor`](crate::auth::Actor); nothing here reads request state.

pub mod access;
pub mod catalog;
pub mod dispute;
pub mod ledger;
pub mod lifecycle;
pub mod status;
