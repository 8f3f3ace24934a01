//! Code shared between the client core and the user interface

#![warn(unused_crate_dependencies)]

pub mod config;
pub mod const_config;
pub mod errors;
pub mod id;
mod macros;
pub mod organization;
pub mod profile;
pub mod req_args;
pub mod session;

#[cfg(not(target_arch = "wasm32"))]
pub mod telemetry;
