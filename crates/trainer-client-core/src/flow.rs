use tracing::info;
use trainer_shared::id::UserId;

use crate::{organization::OrgFlag, session::SessionState};

/// Which top level screen should be showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFlow {
    #[default]
    ResolvingSession,
    Unauthenticated,
    CheckingOrganization,
    Onboarding,
    Routed,
}

impl PageFlow {
    pub fn derive(session: &SessionState, org: OrgFlag) -> Self {
        match (&session.session, session.is_loading) {
            (None, true) => Self::ResolvingSession,
            (None, false) => Self::Unauthenticated,
            (Some(_), _) => match org {
                OrgFlag::Pending => Self::CheckingOrganization,
                OrgFlag::Present(false) => Self::Onboarding,
                OrgFlag::Present(true) => Self::Routed,
            },
        }
    }
}

/// Remembers the flow between frames so that once a user has been routed
/// they stay routed until the session changes
#[derive(Debug, Default)]
pub struct PageFlowTracker {
    current: PageFlow,
    routed_user: Option<UserId>,
}

impl PageFlowTracker {
    pub fn current(&self) -> PageFlow {
        self.current
    }

    pub fn update(&mut self, session: &SessionState, org: OrgFlag) -> PageFlow {
        let user_id = session.user_id();
        let next = if user_id.is_some() && user_id == self.routed_user {
            PageFlow::Routed
        } else {
            PageFlow::derive(session, org)
        };
        self.routed_user = if next == PageFlow::Routed {
            user_id
        } else {
            None
        };
        if next != self.current {
            info!(from = ?self.current, to = ?next, "page flow changed");
            self.current = next;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::testing::fake_session;

    use super::*;

    fn signed_in(n: u128) -> SessionState {
        SessionState {
            session: Some(fake_session(n)),
            is_loading: false,
        }
    }

    fn signed_out() -> SessionState {
        SessionState {
            session: None,
            is_loading: false,
        }
    }

    fn loading() -> SessionState {
        SessionState {
            session: None,
            is_loading: true,
        }
    }

    #[rstest]
    #[case::loading(loading(), OrgFlag::Pending, PageFlow::ResolvingSession)]
    #[case::loading_ignores_flag(loading(), OrgFlag::Present(true), PageFlow::ResolvingSession)]
    #[case::signed_out(signed_out(), OrgFlag::Pending, PageFlow::Unauthenticated)]
    #[case::checking(signed_in(1), OrgFlag::Pending, PageFlow::CheckingOrganization)]
    #[case::onboarding(signed_in(1), OrgFlag::Present(false), PageFlow::Onboarding)]
    #[case::routed(signed_in(1), OrgFlag::Present(true), PageFlow::Routed)]
    fn derive(#[case] session: SessionState, #[case] org: OrgFlag, #[case] expected: PageFlow) {
        assert_eq!(PageFlow::derive(&session, org), expected);
    }

    #[test]
    fn routed_is_sticky_for_same_user() {
        let mut tracker = PageFlowTracker::default();
        assert_eq!(
            tracker.update(&signed_in(1), OrgFlag::Present(true)),
            PageFlow::Routed
        );

        assert_eq!(
            tracker.update(&signed_in(1), OrgFlag::Present(false)),
            PageFlow::Routed
        );
        assert_eq!(tracker.update(&signed_in(1), OrgFlag::Pending), PageFlow::Routed);
    }

    #[test]
    fn new_user_starts_over() {
        let mut tracker = PageFlowTracker::default();
        tracker.update(&signed_in(1), OrgFlag::Present(true));

        assert_eq!(tracker.update(&signed_out(), OrgFlag::Pending), PageFlow::Unauthenticated);
        assert_eq!(
            tracker.update(&signed_in(2), OrgFlag::Pending),
            PageFlow::CheckingOrganization
        );
        assert_eq!(tracker.current(), PageFlow::CheckingOrganization);
    }

    #[test]
    fn onboarding_to_routed() {
        let mut tracker = PageFlowTracker::default();
        tracker.update(&loading(), OrgFlag::Pending);
        tracker.update(&signed_in(1), OrgFlag::Pending);
        assert_eq!(
            tracker.update(&signed_in(1), OrgFlag::Present(false)),
            PageFlow::Onboarding
        );

        assert_eq!(tracker.update(&signed_in(1), OrgFlag::Present(true)), PageFlow::Routed);
    }
}
