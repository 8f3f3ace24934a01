//! Everything a client needs to know who is signed in, whether they have an
//! organization and which screen to show
//! NB: The assumption is made that the async runtime has already been started
//! before any functions from this library are called

#![warn(unused_crate_dependencies)]

mod auth;
pub mod backend;
pub mod cache;
mod client;
mod error;
mod flow;
mod organization;
mod session;
mod spawn;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

pub use auth::AuthOps;
pub use backend::{AuthChangeKind, AuthEvent, Backend, SignUpOutcome, SupabaseBackend};
pub use cache::{QueryCache, QueryKey};
pub use client::{Client, UiCallBack};
pub use error::ClientError;
pub use flow::{PageFlow, PageFlowTracker};
pub use organization::{create_organization, OrgFlag, OrganizationGate, OrganizationState};
pub use session::{SessionResolver, SessionState};
pub use spawn::BackgroundTask;

pub use reqwest::Url;
