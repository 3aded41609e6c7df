//! Async access to the facility API: batch submission and token session.

mod client;
mod error;
mod session;

pub use client::{FacilityClient, HttpTokenRefresher};
pub use error::ClientError;
pub use session::{RefreshSubscriber, Session, TokenPair, TokenRefresher};
