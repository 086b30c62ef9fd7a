//! crates/kova_core/src/auth.rs
//!
//! Sign-in, sign-up and session restore. Every successful path ends with the
//! user's profile loaded, since no signed-in screen works without it.

use crate::domain::Profile;
use crate::ports::{AuthToken, IdentityService, PortError, ProfileStore};
use crate::registration::{RegistrationSubmission, MIN_PASSWORD_LEN};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Your profile could not be found. Please contact support.")]
    ProfileMissing,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("Something went wrong: {0}")]
    Service(PortError),
}

impl From<PortError> for AuthError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::Unauthorized => AuthError::InvalidCredentials,
            PortError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Service(other),
        }
    }
}

/// A signed-in user with their profile.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: AuthToken,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct AuthFlow {
    identity: Arc<dyn IdentityService>,
    profiles: Arc<dyn ProfileStore>,
}

impl AuthFlow {
    pub fn new(identity: Arc<dyn IdentityService>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    async fn load_profile(
        &self,
        token: AuthToken,
        id: uuid::Uuid,
    ) -> Result<Authenticated, AuthError> {
        match self.profiles.fetch_profile(id).await {
            Ok(profile) => Ok(Authenticated { token, profile }),
            Err(PortError::NotFound(_)) => {
                error!("Identity {} has no profile", id);
                Err(AuthError::ProfileMissing)
            }
            Err(e) => Err(AuthError::Service(e)),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated, AuthError> {
        let email = email.trim().to_lowercase();
        let signed_in = self.identity.sign_in(&email, password).await?;
        info!("User {} signed in", signed_in.identity.id);
        self.load_profile(signed_in.token, signed_in.identity.id).await
    }

    /// Creates the account, then the profile under the new identity's id.
    pub async fn register(
        &self,
        submission: RegistrationSubmission,
    ) -> Result<Authenticated, AuthError> {
        if submission.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let RegistrationSubmission {
            mut profile,
            password,
            recovery,
        } = submission;

        let signed_in = self
            .identity
            .sign_up(&profile.email, &password, Some(&recovery))
            .await?;
        profile.id = signed_in.identity.id;
        profile.email = signed_in.identity.email.clone();

        if let Err(e) = self.profiles.insert_profile(&profile).await {
            error!("Account {} created but profile insert failed: {}", profile.id, e);
            return Err(AuthError::Service(e));
        }
        info!("Registered new user {}", profile.id);
        Ok(Authenticated {
            token: signed_in.token,
            profile,
        })
    }

    /// Picks up an existing session; `None` when signed out or expired.
    pub async fn restore(&self, token: &AuthToken) -> Result<Option<Authenticated>, AuthError> {
        let Some(identity) = self.identity.current_session(token).await? else {
            return Ok(None);
        };
        self.load_profile(token.clone(), identity.id).await.map(Some)
    }

    pub async fn sign_out(&self, token: &AuthToken) {
        if let Err(e) = self.identity.sign_out(token).await {
            warn!("Sign-out failed: {}", e);
        }
    }
}
