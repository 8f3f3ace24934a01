use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};
use trainer_shared::{
    id::UserId,
    organization::{Organization, Role, UserOrganization},
    req_args::CreateOrganizationReqArgs,
    session::Session,
};
use trainer_time::Seconds;

use crate::{
    backend::Backend,
    cache::{CachedValue, FetchTicket, QueryCache, QueryKey},
    spawn::{spawn, BackgroundTask},
    ClientError,
};

/// Whether the user belongs to an organization, if that is known yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrgFlag {
    #[default]
    Pending,
    Present(bool),
}

impl OrgFlag {
    /// `None` while the answer is still pending
    #[must_use]
    pub fn is_member(self) -> Option<bool> {
        match self {
            OrgFlag::Pending => None,
            OrgFlag::Present(value) => Some(value),
        }
    }
}

/// The current user's organization as far as it is known
#[derive(Debug, Clone, Default)]
pub struct OrganizationState {
    pub organization: Option<UserOrganization>,
    pub is_loading: bool,
}

/// Decides if a signed in user still needs to be onboarded
#[derive(Debug, Clone)]
pub struct OrganizationGate {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    stale_after: Seconds,
}

impl OrganizationGate {
    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache, stale_after: Seconds) -> Self {
        Self {
            backend,
            cache,
            stale_after,
        }
    }

    /// Stays [`OrgFlag::Pending`] without doing anything until there is a user
    pub fn has_organization(&self, user_id: Option<&UserId>) -> OrgFlag {
        let Some(user_id) = user_id else {
            return OrgFlag::Pending;
        };
        if let Some(check) = self.fetch_if_needed(*user_id) {
            spawn(check);
        }
        self.current(user_id)
    }

    /// Reads the cache without starting anything
    pub fn current(&self, user_id: &UserId) -> OrgFlag {
        match self
            .cache
            .get(&QueryKey::UserHasOrganization(*user_id))
            .and_then(CachedValue::into_has_organization)
        {
            Some(value) => OrgFlag::Present(value),
            None => OrgFlag::Pending,
        }
    }

    /// Returns the check to run if the cached answer is missing or stale and
    /// none is running
    pub fn fetch_if_needed(&self, user_id: UserId) -> Option<impl BackgroundTask> {
        let key = QueryKey::UserHasOrganization(user_id);
        if !self.cache.needs_fetch(&key, Some(self.stale_after)) {
            return None;
        }
        let ticket = self.cache.begin_fetch(&key)?;
        Some(check_membership(
            Arc::clone(&self.backend),
            self.cache.clone(),
            ticket,
        ))
    }

    /// Checks again immediately, ignoring any check already running
    pub fn refetch(&self, user_id: UserId) -> impl BackgroundTask {
        let ticket = self
            .cache
            .force_fetch(&QueryKey::UserHasOrganization(user_id));
        check_membership(Arc::clone(&self.backend), self.cache.clone(), ticket)
    }

    /// The organization from the session's metadata or, failing that, as
    /// looked up on the backend (in the background)
    pub fn organization(&self, session: &Session) -> OrganizationState {
        if let Some(organization) = session.user.organization_from_metadata() {
            return OrganizationState {
                organization: Some(organization),
                is_loading: false,
            };
        }
        if let Some(lookup) = self.organization_lookup_if_needed(session.user_id()) {
            spawn(lookup);
        }
        match self
            .cache
            .get(&QueryKey::Organization)
            .and_then(CachedValue::into_organization)
        {
            Some(organization) => OrganizationState {
                organization,
                is_loading: false,
            },
            None => OrganizationState {
                organization: None,
                is_loading: true,
            },
        }
    }

    pub fn organization_lookup_if_needed(&self, user_id: UserId) -> Option<impl BackgroundTask> {
        if !self.cache.needs_fetch(&QueryKey::Organization, None) {
            return None;
        }
        let ticket = self.cache.begin_fetch(&QueryKey::Organization)?;
        Some(lookup_organization(
            Arc::clone(&self.backend),
            self.cache.clone(),
            user_id,
            ticket,
        ))
    }
}

#[tracing::instrument(skip(backend, cache))]
async fn check_membership(backend: Arc<dyn Backend>, cache: QueryCache, ticket: FetchTicket) {
    let has_organization = match backend.user_has_organization().await {
        Ok(value) => value,
        Err(e) => {
            error!(?e, "failed to check organization membership, assuming none");
            false
        }
    };
    cache.complete_fetch(ticket, CachedValue::HasOrganization(has_organization));
}

#[tracing::instrument(skip(backend, cache, ticket))]
async fn lookup_organization(
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    user_id: UserId,
    ticket: FetchTicket,
) {
    let organization = match find_organization(backend.as_ref(), user_id).await {
        Ok(organization) => organization,
        Err(e) => {
            error!(?e, "failed to look up organization");
            None
        }
    };
    cache.complete_fetch(ticket, CachedValue::Organization(organization));
}

async fn find_organization(
    backend: &dyn Backend,
    user_id: UserId,
) -> anyhow::Result<Option<UserOrganization>> {
    let Some(member) = backend.get_membership(user_id).await? else {
        return Ok(None);
    };
    let Some(organization) = backend.get_organization(member.org_id).await? else {
        warn!(?member, "membership refers to an organization that was not found");
        return Ok(None);
    };
    Ok(Some(UserOrganization {
        organization,
        member,
    }))
}

/// Creates the organization and then invites everyone in `invitee_emails` as
/// members. Failed invitations are logged but do not fail the creation.
///
/// Nothing is sent if the name or any non blank email is invalid.
#[tracing::instrument(skip(backend, cache, invitee_emails))]
pub async fn create_organization<'a, I>(
    backend: &dyn Backend,
    cache: &QueryCache,
    name: &str,
    invitee_emails: I,
) -> Result<Organization, ClientError>
where
    I: IntoIterator<Item = &'a str>,
{
    let args = CreateOrganizationReqArgs::from_form(name, invitee_emails)?;

    let organization = match backend.create_organization(&args.name).await {
        Ok(organization) => organization,
        Err(e) => {
            error!(?e, "failed to create organization");
            return Err(e.into());
        }
    };
    info!(org_id = %organization.id, "organization created");

    let org_id = organization.id;
    let invitations = args.invitee_emails.iter().map(|email| async move {
        let outcome = backend.invite_user(email, org_id, Role::Member).await;
        (email, outcome)
    });
    for (email, outcome) in join_all(invitations).await {
        if let Err(e) = outcome {
            warn!(%email, ?e, "failed to invite user");
        }
    }

    cache.invalidate_where(|key| matches!(key, QueryKey::UserHasOrganization(_)));
    cache.invalidate(&QueryKey::Organization);
    cache.invalidate(&QueryKey::Session);
    Ok(organization)
}
