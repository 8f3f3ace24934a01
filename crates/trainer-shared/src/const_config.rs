//! Stores settings that are not expected to need to change but grouped together
//! for discoverability and reuse. Each constant should be prefixed by the module
//! name to allow importing the constant only and still be readable

use trainer_time::Seconds;

pub mod client {
    use super::*;

    /// How long a "does the user have an organization" answer is served from
    /// the cache before it is checked again
    pub const CLIENT_HAS_ORG_STALE_TIME: Seconds = Seconds::from_minutes(5);
    pub const CLIENT_REQUEST_TIMEOUT: Seconds = Seconds::new(30);
    /// A session this close to expiring is refreshed before it is used
    pub const CLIENT_SESSION_REFRESH_MARGIN: Seconds = Seconds::new(60);
    /// Native default for where the signed in session is kept between runs
    pub const CLIENT_SESSION_FILE: &str = "session.json";
    /// Browser local storage key for the signed in session
    pub const CLIENT_SESSION_STORAGE_KEY: &str = "squad-trainer-auth-token";
    /// Wider than this and the app refuses to render (mobile only)
    pub const CLIENT_MOBILE_MAX_WIDTH: f32 = 430.0;
    pub const CLIENT_DEFAULT_EDGE_SPACING: f32 = 20.0;
    pub const CLIENT_DOCK_MIN_ITEMS: usize = 2;
    pub const CLIENT_DOCK_MAX_ITEMS: usize = 8;
}

/// Client side routes (not a network protocol)
pub mod route {
    pub const ROUTE_ROOT: &str = "/";
    pub const ROUTE_HOME: &str = "/home";
    pub const ROUTE_TRAINING: &str = "/training";
    pub const ROUTE_SETTINGS: &str = "/settings";
    pub const ROUTE_AUTH: &str = "/auth";
}

/// Backend endpoints, relative to the configured backend url
pub mod path {
    mod path_spec;
    pub use path_spec::PathSpec;

    pub const PATH_AUTH_AUTHORIZE: &str = "/auth/v1/authorize";
    pub const PATH_AUTH_LOGOUT: PathSpec = PathSpec::post("/auth/v1/logout");
    pub const PATH_AUTH_OTP: PathSpec = PathSpec::post("/auth/v1/otp");
    pub const PATH_AUTH_SIGNUP: PathSpec = PathSpec::post("/auth/v1/signup");
    pub const PATH_AUTH_TOKEN: PathSpec = PathSpec::post("/auth/v1/token");
    pub const PATH_AUTH_USER: PathSpec = PathSpec::get("/auth/v1/user");
    pub const PATH_REST_ORGANIZATIONS: PathSpec = PathSpec::get("/rest/v1/organizations");
    pub const PATH_REST_ORGANIZATION_MEMBERS: PathSpec =
        PathSpec::get("/rest/v1/organization_members");
    pub const PATH_RPC_CREATE_ORGANIZATION: PathSpec =
        PathSpec::post("/rest/v1/rpc/create_organization");
    pub const PATH_RPC_INVITE_USER: PathSpec = PathSpec::post("/rest/v1/rpc/invite_user");
    pub const PATH_RPC_USER_HAS_ORGANIZATION: PathSpec =
        PathSpec::post("/rest/v1/rpc/user_has_organization");
}

#[cfg(test)]
mod tests {
    use static_assertions::const_assert;

    use super::client::{CLIENT_DOCK_MAX_ITEMS, CLIENT_DOCK_MIN_ITEMS};

    const_assert!(CLIENT_DOCK_MIN_ITEMS <= CLIENT_DOCK_MAX_ITEMS);

    #[test]
    fn rpc_paths_share_prefix() {
        for spec in [
            super::path::PATH_RPC_CREATE_ORGANIZATION,
            super::path::PATH_RPC_INVITE_USER,
            super::path::PATH_RPC_USER_HAS_ORGANIZATION,
        ] {
            assert!(spec.path.starts_with("/rest/v1/rpc/"), "{}", spec.path);
        }
    }
}
