//! Service wiring and the auth mutation orchestrator.
//!
//! [`AppServices`] owns every collaborator a request can touch (stores,
//! mailer, password hasher, session signer) and exposes one method per API
//! operation. Handlers stay thin: they extract, call, and serialize.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use url::Url;

use sickfits_auth::{
    authorize_command, default_cookie_max_age, default_reset_ttl, explain_authorization,
    require_session, CommandAuthorization, CredentialHasher, NewUser, Permission, PermissionSet,
    Principal, ResetToken, SessionCookie, SessionTokenService, User, UserPatch, UserProfile,
};
use sickfits_core::{Email, ItemId, UserId};
use sickfits_infra::{
    store::postgres::ensure_schema, AppConfig, InMemoryItemStore, InMemoryOutbox,
    InMemoryUserStore, Item, ItemPatch, ItemStore, MailError, Mailer, NewItem, OutgoingMail,
    PostgresItemStore, PostgresUserStore, SmtpMailer, StoreError, UserStore,
};

use crate::app::dto::{
    RequestResetRequest, ResetPasswordRequest, SigninRequest, SignupRequest, SuccessMessage,
    UpdatePermissionsRequest,
};
use crate::app::errors::AppError;
use crate::authz::{Guarded, ItemPolicy};
use crate::context::SessionContext;

const PASSWORDS_DONT_MATCH: &str = "Your passwords don't match!";
const TOKEN_INVALID_OR_EXPIRED: &str = "This token is either invalid or expired!";
const INVALID_PASSWORD: &str = "Invalid Password";
const PASSWORD_REQUIRED: &str = "Password is required";

// -------------------------
// Backends
// -------------------------

/// Storage and mail collaborators.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub items: Arc<dyn ItemStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl Backends {
    /// Everything in memory (dev/test). The outbox is returned so callers can
    /// inspect sent mail.
    pub fn in_memory() -> (Self, Arc<InMemoryOutbox>) {
        let outbox = Arc::new(InMemoryOutbox::new());
        let backends = Self {
            users: Arc::new(InMemoryUserStore::new()),
            items: Arc::new(InMemoryItemStore::new()),
            mailer: outbox.clone(),
        };
        (backends, outbox)
    }
}

/// Pick backends from configuration: Postgres when `DATABASE_URL` is set,
/// SMTP when `MAIL_HOST` is set, in-memory otherwise.
pub async fn build_backends(config: &AppConfig) -> Result<Backends, AppError> {
    let (users, items): (Arc<dyn UserStore>, Arc<dyn ItemStore>) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url.expose_secret())
                .await
                .map_err(|e| AppError::Store(StoreError::Backend(e.to_string())))?;
            ensure_schema(&pool).await?;
            tracing::info!("using postgres stores");
            (
                Arc::new(PostgresUserStore::new(pool.clone())),
                Arc::new(PostgresItemStore::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores (data is lost on restart)");
            (
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryItemStore::new()),
            )
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("MAIL_HOST not set; reset emails go to an in-memory outbox");
            Arc::new(InMemoryOutbox::new())
        }
    };

    Ok(Backends {
        users,
        items,
        mailer,
    })
}

// -------------------------
// Settings
// -------------------------

/// Retry schedule for reset emails. Delay grows linearly with the attempt.
#[derive(Debug, Clone, Copy)]
pub struct MailRetry {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for MailRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Immutable per-process settings the orchestrator needs.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub frontend_url: Url,
    pub cookie: SessionCookie,
    pub reset_ttl: chrono::Duration,
    pub item_policy: ItemPolicy,
    pub mail_retry: MailRetry,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frontend_url: config.frontend_url.clone(),
            cookie: SessionCookie::new(default_cookie_max_age(), config.cookie_secure()),
            reset_ttl: default_reset_ttl(),
            item_policy: ItemPolicy {
                enforce_labels: config.enforce_item_permissions,
            },
            mail_retry: MailRetry::default(),
        }
    }
}

// -------------------------
// Services
// -------------------------

/// Result of an operation that logs the caller in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: UserProfile,
    /// `Set-Cookie` value carrying the new session token.
    pub cookie: String,
}

pub struct AppServices {
    users: Arc<dyn UserStore>,
    items: Arc<dyn ItemStore>,
    mailer: Arc<dyn Mailer>,
    passwords: Arc<dyn CredentialHasher>,
    sessions: Arc<SessionTokenService>,
    settings: ServiceSettings,
}

impl AppServices {
    pub fn new(
        backends: Backends,
        passwords: Arc<dyn CredentialHasher>,
        sessions: Arc<SessionTokenService>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            users: backends.users,
            items: backends.items,
            mailer: backends.mailer,
            passwords,
            sessions,
            settings,
        }
    }

    pub fn session_tokens(&self) -> Arc<SessionTokenService> {
        self.sessions.clone()
    }

    pub fn frontend_url(&self) -> &Url {
        &self.settings.frontend_url
    }

    // -------------------------
    // Auth mutations
    // -------------------------

    #[tracing::instrument(name = "signup", skip_all)]
    pub async fn signup(&self, req: SignupRequest) -> Result<SignedIn, AppError> {
        let email = Email::parse(&req.email)?;
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if req.password.is_empty() {
            return Err(AppError::Validation(PASSWORD_REQUIRED.to_string()));
        }

        let password_hash = self.passwords.hash(req.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: email.clone(),
                name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    AppError::ConstraintViolation(format!("A user with email {email} already exists"))
                }
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "user signed up");
        self.signed_in(&user)
    }

    #[tracing::instrument(name = "signin", skip_all)]
    pub async fn signin(&self, req: SigninRequest) -> Result<SignedIn, AppError> {
        let lookup = req.email.trim().to_lowercase();
        let user = self
            .users
            .find_by_email(&lookup)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No such user found for email: {lookup}")))?;

        let valid = self
            .passwords
            .verify(req.password, user.password_hash.clone())
            .await?;
        if !valid {
            tracing::warn!(user_id = %user.id, "signin rejected: wrong password");
            return Err(AppError::InvalidCredential(INVALID_PASSWORD.to_string()));
        }

        tracing::info!(user_id = %user.id, "user signed in");
        self.signed_in(&user)
    }

    /// Always succeeds, with or without a session.
    pub fn signout(&self) -> (SuccessMessage, String) {
        (SuccessMessage::new("Goodbye!"), self.settings.cookie.clear())
    }

    /// Issue a reset token and mail it. The mail goes out in the background;
    /// its outcome never changes the response.
    #[tracing::instrument(name = "request_reset", skip_all)]
    pub async fn request_reset(&self, req: RequestResetRequest) -> Result<SuccessMessage, AppError> {
        let user = self
            .users
            .find_by_email(&req.email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No such user found for email: {}", req.email)))?;

        let (token, record) = ResetToken::issue(Utc::now(), self.settings.reset_ttl);
        self.users.update(user.id, UserPatch::reset_token(record)).await?;

        tracing::info!(user_id = %user.id, "reset token issued");
        let mail = reset_mail(user.email.as_str(), &self.reset_link(&token));
        self.spawn_mail(mail);

        Ok(SuccessMessage::new("Thanks!"))
    }

    #[tracing::instrument(name = "reset_password", skip_all)]
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<SignedIn, AppError> {
        if req.password != req.confirm_password {
            return Err(AppError::Validation(PASSWORDS_DONT_MATCH.to_string()));
        }
        if req.password.is_empty() {
            return Err(AppError::Validation(PASSWORD_REQUIRED.to_string()));
        }

        let digest = ResetToken::from_client(req.reset_token).digest();
        let invalid = || {
            tracing::warn!("reset rejected: token invalid or expired");
            AppError::InvalidOrExpired(TOKEN_INVALID_OR_EXPIRED.to_string())
        };

        // The token must be live before any hashing happens.
        if self.users.find_by_reset_token(&digest, Utc::now()).await?.is_none() {
            return Err(invalid());
        }

        let password_hash = self.passwords.hash(req.password).await?;
        let user = self
            .users
            .consume_reset_token(&digest, Utc::now(), password_hash)
            .await?
            .ok_or_else(invalid)?;

        tracing::info!(user_id = %user.id, "password reset");
        self.signed_in(&user)
    }

    // -------------------------
    // Session queries
    // -------------------------

    /// The caller's account, or `None` when anonymous or the account is gone.
    pub async fn me(&self, session: &SessionContext) -> Result<Option<UserProfile>, AppError> {
        let Some(user_id) = session.user_id() else {
            return Ok(None);
        };
        Ok(self.users.find_by_id(user_id).await?.map(|u| u.profile()))
    }

    // -------------------------
    // User administration
    // -------------------------

    pub async fn users(&self, session: &SessionContext) -> Result<Vec<UserProfile>, AppError> {
        self.authorize(session, &Guarded::admin(())).await?;
        let users = self.users.list().await?;
        Ok(users.iter().map(User::profile).collect())
    }

    #[tracing::instrument(name = "update_permissions", skip_all)]
    pub async fn update_permissions(
        &self,
        session: &SessionContext,
        req: UpdatePermissionsRequest,
    ) -> Result<UserProfile, AppError> {
        let target: UserId = req.user_id.parse()?;
        let permissions = PermissionSet::from_labels(&req.permissions)?;

        let cmd = Guarded::admin(permissions);
        let actor = self.authorize(session, &cmd).await?;

        let user = self
            .users
            .update(target, UserPatch::permissions(cmd.inner))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AppError::NotFound(format!("No user found for id: {target}")),
                other => other.into(),
            })?;

        tracing::info!(actor = %actor, target = %target, permissions = %user.permissions, "permissions updated");
        Ok(user.profile())
    }

    // -------------------------
    // Items
    // -------------------------

    pub async fn items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.items.list().await?)
    }

    pub async fn item(&self, id: &str) -> Result<Item, AppError> {
        let id: ItemId = id.parse()?;
        self.items
            .get(id)
            .await?
            .ok_or_else(|| item_not_found(id))
    }

    #[tracing::instrument(name = "create_item", skip_all)]
    pub async fn create_item(&self, session: &SessionContext, new_item: NewItem) -> Result<Item, AppError> {
        let cmd = self.settings.item_policy.guard(new_item, Permission::ItemCreate);
        let owner = self.authorize(session, &cmd).await?;

        let new_item = cmd.inner;
        if new_item.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if new_item.price < 0 {
            return Err(AppError::Validation("Price must not be negative".to_string()));
        }

        let item = self.items.create(Some(owner), new_item).await?;
        tracing::info!(item_id = %item.id, owner = %owner, "item created");
        Ok(item)
    }

    #[tracing::instrument(name = "update_item", skip_all)]
    pub async fn update_item(
        &self,
        session: &SessionContext,
        id: &str,
        patch: ItemPatch,
    ) -> Result<Item, AppError> {
        let id: ItemId = id.parse()?;
        let cmd = self.settings.item_policy.guard(patch, Permission::ItemUpdate);
        self.authorize(session, &cmd).await?;

        if cmd.inner.price.is_some_and(|p| p < 0) {
            return Err(AppError::Validation("Price must not be negative".to_string()));
        }

        self.items.update(id, cmd.inner).await.map_err(|e| match e {
            StoreError::NotFound => item_not_found(id),
            other => other.into(),
        })
    }

    #[tracing::instrument(name = "delete_item", skip_all)]
    pub async fn delete_item(&self, session: &SessionContext, id: &str) -> Result<Item, AppError> {
        let id: ItemId = id.parse()?;
        let cmd = self.settings.item_policy.guard(id, Permission::ItemDelete);
        self.authorize(session, &cmd).await?;

        let item = self.items.delete(cmd.inner).await.map_err(|e| match e {
            StoreError::NotFound => item_not_found(id),
            other => other.into(),
        })?;
        tracing::info!(item_id = %item.id, "item deleted");
        Ok(item)
    }

    // -------------------------
    // Internals
    // -------------------------

    /// Run the permission gate for `cmd`.
    ///
    /// Labels are read from the store, not the token, so permission changes
    /// apply to existing sessions immediately.
    async fn authorize<C: CommandAuthorization>(
        &self,
        session: &SessionContext,
        cmd: &C,
    ) -> Result<UserId, AppError> {
        let user_id = require_session(session.user_id())?;
        if cmd.required_permissions().is_empty() {
            return Ok(user_id);
        }

        let principal = self.users.find_by_id(user_id).await?.as_ref().map(Principal::from);
        authorize_command(principal.as_ref(), cmd).map_err(|e| {
            if let Some(p) = &principal {
                let explanation = explain_authorization(p, cmd.required_permissions());
                tracing::warn!(user_id = %user_id, reason = %explanation.reason, "authorization denied");
            }
            AppError::from(e)
        })
    }

    fn signed_in(&self, user: &User) -> Result<SignedIn, AppError> {
        let token = self.sessions.issue(user.id)?;
        Ok(SignedIn {
            user: user.profile(),
            cookie: self.settings.cookie.attach(&token),
        })
    }

    fn reset_link(&self, token: &ResetToken) -> String {
        format!(
            "{}/reset?resetToken={}",
            self.settings.frontend_url.as_str().trim_end_matches('/'),
            token.expose()
        )
    }

    fn spawn_mail(&self, mail: OutgoingMail) {
        let mailer = self.mailer.clone();
        let retry = self.settings.mail_retry;
        tokio::spawn(async move {
            if let Err(e) = deliver_with_retry(mailer.as_ref(), mail, retry).await {
                tracing::error!(error = %e, attempts = retry.attempts, "reset email could not be delivered");
            }
        });
    }
}

fn item_not_found(id: ItemId) -> AppError {
    AppError::NotFound(format!("No item found for id: {id}"))
}

fn reset_mail(to: &str, link: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Your Password Reset Token".to_string(),
        html: format!(
            "<div style=\"font-family: sans-serif; line-height: 1.6; font-size: 18px;\">\
             <h2>Hello There!</h2>\
             <p>Your Password Reset Token is here!</p>\
             <p><a href=\"{link}\">Click Here to Reset</a></p>\
             <p>This link expires in one hour.</p>\
             </div>"
        ),
    }
}

async fn deliver_with_retry(
    mailer: &dyn Mailer,
    mail: OutgoingMail,
    retry: MailRetry,
) -> Result<(), MailError> {
    let mut attempt = 1;
    loop {
        match mailer.send(mail.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retry.attempts => {
                tracing::warn!(attempt, error = %e, "reset email failed; retrying");
                tokio::time::sleep(retry.base_delay * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
