//! Screens. The gate screens own their form state, the tabs are drawn from
//! the client's state every frame.

pub mod auth;
pub mod data_state;
pub mod home;
pub mod onboarding;
pub mod settings;
pub mod training;

pub use auth::UiAuth;
pub use onboarding::UiOnboarding;
