use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::config::MarketplaceConfig;

use super::auth::{
    ensure_admin, ensure_can_apply, ensure_can_cancel, ensure_can_post_jobs,
    ensure_can_view_application, ensure_job_owner, ensure_manages_application,
    ensure_offer_recipient, AccessError, Actor,
};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Interview, InterviewId, InterviewKind,
    InterviewStatus, Job, JobFilters, JobId, JobUpdate, NewApplication, NewInterview, NewJob,
    NewOffer, NewUser, NewVerification, Offer, OfferId, OfferStatus, Role, SubscriptionTier,
    TransitionEntry, User, UserId, VerificationDecision, VerificationId, VerificationRequest,
    VerificationStatus,
};
use super::notify::{NotificationEvent, Notifier};
use super::sessions::SessionRegistry;
use super::storage::{Storage, StorageError};

/// Error raised by the lifecycle service. The router maps each variant to
/// one HTTP status family.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn validation(field: &'static str, message: impl Into<String>) -> MarketplaceError {
    MarketplaceError::Validation {
        field,
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> MarketplaceError {
    MarketplaceError::Conflict(message.into())
}

fn forbidden(message: impl Into<String>) -> MarketplaceError {
    MarketplaceError::Access(AccessError::Forbidden(message.into()))
}

static USER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static INTERVIEW_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static VERIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed)
}

/// Service composing the authorization guard, storage contract, and
/// notification dispatcher. Every mutating operation follows the same
/// order: guard, validate, write, audit, best-effort notify.
pub struct MarketplaceService<S, N> {
    storage: Arc<S>,
    notifier: Arc<N>,
    sessions: SessionRegistry,
    config: MarketplaceConfig,
}

impl<S, N> MarketplaceService<S, N>
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    pub fn new(storage: Arc<S>, notifier: Arc<N>, config: MarketplaceConfig) -> Self {
        Self {
            storage,
            notifier,
            sessions: SessionRegistry::default(),
            config,
        }
    }

    pub fn register(&self, new: NewUser) -> Result<User, MarketplaceError> {
        let email = new.email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(validation("email", "a valid e-mail address is required"));
        }
        if new.password.len() < 8 {
            return Err(validation("password", "must be at least 8 characters"));
        }
        if new.first_name.trim().is_empty() {
            return Err(validation("first_name", "must not be empty"));
        }
        if new.last_name.trim().is_empty() {
            return Err(validation("last_name", "must not be empty"));
        }

        let role = match new.role {
            None => Role::Applicant,
            Some(Role::Admin) => {
                return Err(validation("role", "admin accounts cannot be self-registered"));
            }
            Some(role) => role,
        };

        if self.storage.user_by_email(&email)?.is_some() {
            return Err(conflict("e-mail address already registered"));
        }

        let user = User {
            id: UserId(next(&USER_SEQUENCE)),
            email,
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            role,
            age: new.age,
            bio: None,
            cv_url: None,
            location: new.location,
            company_name: new.company_name,
            is_verified: false,
            subscription: SubscriptionTier::Free,
            created_at: Utc::now(),
        };

        Ok(self.storage.create_user(user, &new.password)?)
    }

    /// Exchange credentials for a session token.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, String), MarketplaceError> {
        let email = email.trim().to_ascii_lowercase();
        match self.storage.verify_credentials(&email, password)? {
            Some(user) => {
                let token = self.sessions.issue(user.id);
                Ok((user, token))
            }
            None => Err(MarketplaceError::Access(AccessError::Unauthorized)),
        }
    }

    pub fn logout(&self, token: &str) {
        self.sessions.revoke(token);
    }

    /// Resolve a bearer token into the acting user. The actor is threaded
    /// explicitly through every operation; nothing reads session state
    /// after this point.
    pub fn resolve_actor(&self, token: Option<&str>) -> Result<Actor, MarketplaceError> {
        let token = token.ok_or(AccessError::Unauthorized)?;
        let user_id = self
            .sessions
            .resolve(token)
            .ok_or(AccessError::Unauthorized)?;
        let user = self
            .storage
            .user(user_id)?
            .ok_or(AccessError::Unauthorized)?;
        Ok(Actor::from(&user))
    }

    /// Seed (or reuse) an admin account from startup configuration.
    pub fn bootstrap_admin(&self, email: &str, password: &str) -> Result<User, MarketplaceError> {
        let email = email.trim().to_ascii_lowercase();
        if let Some(existing) = self.storage.user_by_email(&email)? {
            return Ok(existing);
        }
        let user = User {
            id: UserId(next(&USER_SEQUENCE)),
            email,
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
            role: Role::Admin,
            age: None,
            bio: None,
            cv_url: None,
            location: None,
            company_name: None,
            is_verified: true,
            subscription: SubscriptionTier::Premium,
            created_at: Utc::now(),
        };
        Ok(self.storage.create_user(user, password)?)
    }

    pub fn post_job(&self, actor: &Actor, new: NewJob) -> Result<Job, MarketplaceError> {
        ensure_can_post_jobs(actor)?;

        if new.title.trim().is_empty() {
            return Err(validation("title", "must not be empty"));
        }
        if new.description.trim().is_empty() {
            return Err(validation("description", "must not be empty"));
        }
        if new.category.trim().is_empty() {
            return Err(validation("category", "must not be empty"));
        }
        if new.location.trim().is_empty() {
            return Err(validation("location", "must not be empty"));
        }
        if new.salary_min > new.salary_max {
            return Err(validation("salary_min", "must not exceed salary_max"));
        }
        if let (Some(min), Some(max)) = (new.audience.min_age, new.audience.max_age) {
            if min > max {
                return Err(validation("audience", "min_age must not exceed max_age"));
            }
        }

        if actor.role == Role::Employer {
            let employer = self
                .storage
                .user(actor.id)?
                .ok_or(MarketplaceError::NotFound("user"))?;
            if employer.subscription == SubscriptionTier::Free {
                let active = self
                    .storage
                    .jobs_by_employer(actor.id)?
                    .iter()
                    .filter(|job| job.is_active)
                    .count();
                if active >= self.config.free_tier_job_limit {
                    return Err(conflict(
                        "free tier job posting limit reached; upgrade to post more",
                    ));
                }
            }
        }

        let job = Job {
            id: JobId(next(&JOB_SEQUENCE)),
            employer_id: actor.id,
            title: new.title.trim().to_string(),
            description: new.description,
            category: new.category.trim().to_string(),
            location: new.location.trim().to_string(),
            job_type: new.job_type,
            salary_min: new.salary_min,
            salary_max: new.salary_max,
            is_active: true,
            audience: new.audience,
            created_at: Utc::now(),
        };

        Ok(self.storage.create_job(job)?)
    }

    /// Public listing: conjunctive filters over active jobs only.
    pub fn list_jobs(&self, mut filters: JobFilters) -> Result<Vec<Job>, MarketplaceError> {
        filters.only_active = true;
        Ok(self.storage.jobs(&filters)?)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job, MarketplaceError> {
        self.storage
            .job(id)?
            .ok_or(MarketplaceError::NotFound("job"))
    }

    pub fn update_job(
        &self,
        actor: &Actor,
        id: JobId,
        patch: JobUpdate,
    ) -> Result<Job, MarketplaceError> {
        let mut job = self.get_job(id)?;
        ensure_job_owner(actor, &job)?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(validation("title", "must not be empty"));
            }
            job.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            job.description = description;
        }
        if let Some(category) = patch.category {
            job.category = category;
        }
        if let Some(location) = patch.location {
            job.location = location;
        }
        if let Some(job_type) = patch.job_type {
            job.job_type = job_type;
        }
        if let Some(salary_min) = patch.salary_min {
            job.salary_min = salary_min;
        }
        if let Some(salary_max) = patch.salary_max {
            job.salary_max = salary_max;
        }
        if let Some(is_active) = patch.is_active {
            job.is_active = is_active;
        }
        if let Some(audience) = patch.audience {
            job.audience = audience;
        }
        if job.salary_min > job.salary_max {
            return Err(validation("salary_min", "must not exceed salary_max"));
        }

        self.storage.update_job(job.clone())?;
        Ok(job)
    }

    pub fn delete_job(&self, actor: &Actor, id: JobId) -> Result<(), MarketplaceError> {
        let job = self.get_job(id)?;
        ensure_job_owner(actor, &job)?;
        // Cascade to applications, offers, and interviews happens in storage.
        Ok(self.storage.delete_job(id)?)
    }

    pub fn employer_jobs(&self, actor: &Actor) -> Result<Vec<Job>, MarketplaceError> {
        ensure_can_post_jobs(actor)?;
        Ok(self.storage.jobs_by_employer(actor.id)?)
    }

    pub fn apply(
        &self,
        actor: &Actor,
        new: NewApplication,
    ) -> Result<Application, MarketplaceError> {
        ensure_can_apply(actor)?;

        let job = self.get_job(new.job_id)?;
        if !job.is_active {
            return Err(conflict("job is no longer accepting applications"));
        }
        // The guard already insisted on a known age.
        if let Some(age) = actor.age {
            if !job.audience.admits_age(age) {
                return Err(forbidden("this job is limited to a different age range"));
            }
        }

        let duplicate = self
            .storage
            .applications_for_applicant(actor.id)?
            .iter()
            .any(|existing| existing.job_id == job.id && existing.status.is_live());
        if duplicate {
            return Err(conflict("an application for this job is already open"));
        }

        let now = Utc::now();
        let application = Application {
            id: ApplicationId(next(&APPLICATION_SEQUENCE)),
            job_id: job.id,
            applicant_id: actor.id,
            status: ApplicationStatus::Pending,
            message: new.message,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let stored = self.storage.create_application(application)?;

        self.dispatch(NotificationEvent::ApplicationSubmitted {
            application_id: stored.id,
            job_id: job.id,
            applicant_id: stored.applicant_id,
            employer_id: job.employer_id,
        });
        Ok(stored)
    }

    pub fn applications_for_job(
        &self,
        actor: &Actor,
        job_id: JobId,
    ) -> Result<Vec<Application>, MarketplaceError> {
        let job = self.get_job(job_id)?;
        ensure_manages_application(actor, &job)?;
        Ok(self.storage.applications_for_job(job_id)?)
    }

    pub fn my_applications(&self, actor: &Actor) -> Result<Vec<Application>, MarketplaceError> {
        Ok(self.storage.applications_for_applicant(actor.id)?)
    }

    pub fn get_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Application, MarketplaceError> {
        let application = self.fetch_application(id)?;
        let job = self.get_job(application.job_id)?;
        ensure_can_view_application(actor, &application, &job)?;
        Ok(application)
    }

    /// Audit trail of status changes, readable by the managing employer or
    /// an admin.
    pub fn application_history(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Vec<TransitionEntry>, MarketplaceError> {
        let application = self.fetch_application(id)?;
        let job = self.get_job(application.job_id)?;
        ensure_manages_application(actor, &job)?;
        Ok(self.storage.transitions_for(id)?)
    }

    /// Employer-side status moves. Only two edges are reachable here:
    /// rejection, and the reset override back to `pending`. Everything else
    /// flows through offers.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: ApplicationId,
        requested: ApplicationStatus,
    ) -> Result<Application, MarketplaceError> {
        let application = self.fetch_application(id)?;
        let job = self.get_job(application.job_id)?;
        ensure_manages_application(actor, &job)?;

        match requested {
            ApplicationStatus::Rejected => {}
            ApplicationStatus::Pending => {
                if application.status == ApplicationStatus::Pending {
                    return Err(MarketplaceError::InvalidTransition {
                        from: ApplicationStatus::Pending,
                        to: ApplicationStatus::Pending,
                    });
                }
            }
            other => {
                return Err(MarketplaceError::InvalidTransition {
                    from: application.status,
                    to: other,
                });
            }
        }

        let applicant_id = application.applicant_id;
        let from = application.status;
        let updated = self.transition(actor, application, requested)?;

        // The reset override voids any offer still on the table. Offers are
        // only touched once the version-checked write has gone through, so a
        // lost race leaves both records where they were.
        if requested == ApplicationStatus::Pending {
            self.decline_open_offers(updated.id)?;
        }

        self.dispatch(NotificationEvent::ApplicationStatusChanged {
            application_id: updated.id,
            applicant_id,
            from,
            to: updated.status,
        });
        Ok(updated)
    }

    pub fn cancel_application(
        &self,
        actor: &Actor,
        id: ApplicationId,
    ) -> Result<Application, MarketplaceError> {
        let application = self.fetch_application(id)?;
        ensure_can_cancel(actor, &application)?;

        let applicant_id = application.applicant_id;
        let from = application.status;
        let updated = self.transition(actor, application, ApplicationStatus::Cancelled)?;

        self.decline_open_offers(updated.id)?;

        self.dispatch(NotificationEvent::ApplicationStatusChanged {
            application_id: updated.id,
            applicant_id,
            from,
            to: updated.status,
        });
        Ok(updated)
    }

    pub fn send_offer(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
        new: NewOffer,
    ) -> Result<Offer, MarketplaceError> {
        let application = self.fetch_application(application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_manages_application(actor, &job)?;

        let salary = match new.salary {
            None => return Err(validation("salary", "salary is required")),
            Some(0) => return Err(validation("salary", "must be greater than zero")),
            Some(salary) => salary,
        };

        if !matches!(
            application.status,
            ApplicationStatus::Pending | ApplicationStatus::Offered
        ) {
            return Err(conflict(format!(
                "cannot send an offer while the application is {}",
                application.status
            )));
        }

        let has_open_offer = self
            .storage
            .offers_for_application(application_id)?
            .iter()
            .any(|offer| offer.status == OfferStatus::Pending);
        if has_open_offer {
            return Err(conflict(
                "a pending offer already exists for this application",
            ));
        }

        // First offer moves the application forward; a re-offer after a
        // decline leaves it where it is. The version-checked write precedes
        // the offer row so a lost race creates no orphan offer.
        let applicant_id = application.applicant_id;
        if application.status == ApplicationStatus::Pending {
            self.transition(actor, application, ApplicationStatus::Offered)?;
        }

        let offer = Offer {
            id: OfferId(next(&OFFER_SEQUENCE)),
            application_id,
            salary,
            compensation_notes: new.compensation_notes,
            note: new.note,
            status: OfferStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        };
        let stored = self.storage.create_offer(offer)?;

        self.dispatch(NotificationEvent::OfferSent {
            offer_id: stored.id,
            application_id,
            applicant_id,
            salary,
        });
        Ok(stored)
    }

    /// Applicant verdict on a pending offer. Acceptance updates the offer
    /// and the parent application in the same lifecycle step so the two can
    /// never disagree about a hire.
    pub fn respond_offer(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        accept: bool,
    ) -> Result<(Offer, Application), MarketplaceError> {
        let mut offer = self
            .storage
            .offer(offer_id)?
            .ok_or(MarketplaceError::NotFound("offer"))?;
        let application = self.fetch_application(offer.application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_offer_recipient(actor, &application)?;

        if offer.status != OfferStatus::Pending {
            return Err(conflict("offer was already decided"));
        }

        let application = if accept {
            // The version-checked application write goes first. A stale write
            // aborts the whole response, so the offer can never record a hire
            // the application does not.
            let updated = self.transition(actor, application, ApplicationStatus::Accepted)?;
            offer.status = OfferStatus::Accepted;
            offer.decided_at = Some(Utc::now());
            self.storage.update_offer(offer.clone())?;
            updated
        } else {
            offer.status = OfferStatus::Declined;
            offer.decided_at = Some(Utc::now());
            self.storage.update_offer(offer.clone())?;
            application
        };

        self.dispatch(NotificationEvent::OfferResponded {
            offer_id: offer.id,
            application_id: application.id,
            employer_id: job.employer_id,
            response: offer.status,
        });
        Ok((offer, application))
    }

    pub fn offers_for_application(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> Result<Vec<Offer>, MarketplaceError> {
        let application = self.fetch_application(application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_can_view_application(actor, &application, &job)?;
        Ok(self.storage.offers_for_application(application_id)?)
    }

    pub fn schedule_interview(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
        new: NewInterview,
    ) -> Result<Interview, MarketplaceError> {
        let application = self.fetch_application(application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_manages_application(actor, &job)?;

        if !matches!(
            application.status,
            ApplicationStatus::Pending | ApplicationStatus::Offered
        ) {
            return Err(conflict(format!(
                "cannot schedule an interview while the application is {}",
                application.status
            )));
        }

        let already_scheduled = self
            .storage
            .interviews_for_application(application_id)?
            .iter()
            .any(|interview| interview.status == InterviewStatus::Scheduled);
        if already_scheduled {
            return Err(conflict(
                "an interview is already scheduled for this application",
            ));
        }

        match new.kind {
            InterviewKind::InPerson if new.location.as_deref().unwrap_or("").trim().is_empty() => {
                return Err(validation("location", "required for in-person interviews"));
            }
            InterviewKind::Video
                if new.meeting_link.as_deref().unwrap_or("").trim().is_empty() =>
            {
                return Err(validation("meeting_link", "required for video interviews"));
            }
            _ => {}
        }

        let interview = Interview {
            id: InterviewId(next(&INTERVIEW_SEQUENCE)),
            application_id,
            date: new.date,
            time: new.time,
            kind: new.kind,
            location: new.location,
            meeting_link: new.meeting_link,
            notes: new.notes,
            status: InterviewStatus::Scheduled,
            created_at: Utc::now(),
        };
        let stored = self.storage.create_interview(interview)?;

        self.dispatch(NotificationEvent::InterviewScheduled {
            interview_id: stored.id,
            application_id,
            applicant_id: application.applicant_id,
        });
        Ok(stored)
    }

    /// Cancelling an interview never touches the application itself.
    pub fn cancel_interview(
        &self,
        actor: &Actor,
        interview_id: InterviewId,
    ) -> Result<Interview, MarketplaceError> {
        let mut interview = self
            .storage
            .interview(interview_id)?
            .ok_or(MarketplaceError::NotFound("interview"))?;
        let application = self.fetch_application(interview.application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_manages_application(actor, &job)?;

        if interview.status != InterviewStatus::Scheduled {
            return Err(conflict("interview is not scheduled"));
        }

        interview.status = InterviewStatus::Cancelled;
        self.storage.update_interview(interview.clone())?;

        self.dispatch(NotificationEvent::InterviewCancelled {
            interview_id: interview.id,
            application_id: application.id,
            applicant_id: application.applicant_id,
        });
        Ok(interview)
    }

    pub fn interviews_for_application(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> Result<Vec<Interview>, MarketplaceError> {
        let application = self.fetch_application(application_id)?;
        let job = self.get_job(application.job_id)?;
        ensure_can_view_application(actor, &application, &job)?;
        Ok(self.storage.interviews_for_application(application_id)?)
    }

    pub fn submit_verification(
        &self,
        actor: &Actor,
        new: NewVerification,
    ) -> Result<VerificationRequest, MarketplaceError> {
        if actor.role != Role::Applicant {
            return Err(forbidden(
                "only applicants submit identity verification requests",
            ));
        }
        if new.id_type.trim().is_empty() {
            return Err(validation("id_type", "must not be empty"));
        }
        if new.id_number.trim().is_empty() {
            return Err(validation("id_number", "must not be empty"));
        }
        if actor.is_verified {
            return Err(conflict("account is already verified"));
        }

        if let Some(existing) = self.storage.verification_for_user(actor.id)? {
            match existing.status {
                VerificationStatus::Pending | VerificationStatus::UnderReview => {
                    return Err(conflict("a verification request is already open"));
                }
                VerificationStatus::Approved => {
                    return Err(conflict("account is already verified"));
                }
                // A rejected request may be resubmitted as a fresh one.
                VerificationStatus::Rejected => {}
            }
        }

        let request = VerificationRequest {
            id: VerificationId(next(&VERIFICATION_SEQUENCE)),
            user_id: actor.id,
            id_type: new.id_type.trim().to_string(),
            id_number: new.id_number.trim().to_string(),
            document_keys: new.document_keys,
            status: VerificationStatus::Pending,
            admin_notes: None,
            submitted_at: Utc::now(),
            decided_at: None,
        };
        Ok(self.storage.create_verification(request)?)
    }

    pub fn my_verification(
        &self,
        actor: &Actor,
    ) -> Result<VerificationRequest, MarketplaceError> {
        self.storage
            .verification_for_user(actor.id)?
            .ok_or(MarketplaceError::NotFound("verification request"))
    }

    pub fn pending_verifications(
        &self,
        actor: &Actor,
    ) -> Result<Vec<VerificationRequest>, MarketplaceError> {
        ensure_admin(actor)?;
        Ok(self.storage.pending_verifications()?)
    }

    /// Admin verdict. Approval flips the user's trust badge in the same
    /// operation.
    pub fn review_verification(
        &self,
        actor: &Actor,
        id: VerificationId,
        decision: VerificationDecision,
    ) -> Result<VerificationRequest, MarketplaceError> {
        ensure_admin(actor)?;

        let mut request = self
            .storage
            .verification(id)?
            .ok_or(MarketplaceError::NotFound("verification request"))?;

        let advance_ok = matches!(
            (request.status, decision.status),
            (VerificationStatus::Pending, VerificationStatus::UnderReview)
                | (
                    VerificationStatus::Pending | VerificationStatus::UnderReview,
                    VerificationStatus::Approved | VerificationStatus::Rejected,
                )
        );
        if !advance_ok {
            return Err(conflict(format!(
                "cannot move verification from {:?} to {:?}",
                request.status, decision.status
            )));
        }

        request.status = decision.status;
        request.admin_notes = decision.admin_notes;
        if matches!(
            decision.status,
            VerificationStatus::Approved | VerificationStatus::Rejected
        ) {
            request.decided_at = Some(Utc::now());
        }
        self.storage.update_verification(request.clone())?;

        if decision.status == VerificationStatus::Approved {
            let mut user = self
                .storage
                .user(request.user_id)?
                .ok_or(MarketplaceError::NotFound("user"))?;
            user.is_verified = true;
            self.storage.update_user(user)?;
        }

        self.dispatch(NotificationEvent::VerificationDecided {
            user_id: request.user_id,
            status: request.status,
        });
        Ok(request)
    }

    fn fetch_application(&self, id: ApplicationId) -> Result<Application, MarketplaceError> {
        self.storage
            .application(id)?
            .ok_or(MarketplaceError::NotFound("application"))
    }

    /// Single choke point for status writes: edge check, optimistic write,
    /// audit entry. Rejected edges leave the record untouched.
    fn transition(
        &self,
        actor: &Actor,
        mut application: Application,
        to: ApplicationStatus,
    ) -> Result<Application, MarketplaceError> {
        let from = application.status;
        if from == to || !from.allows(to) {
            return Err(MarketplaceError::InvalidTransition { from, to });
        }

        application.status = to;
        application.updated_at = Utc::now();
        let stored = self.storage.update_application(application)?;

        self.storage.record_transition(TransitionEntry {
            application_id: stored.id,
            actor_id: actor.id,
            from,
            to,
            at: stored.updated_at,
        })?;
        Ok(stored)
    }

    fn decline_open_offers(&self, application_id: ApplicationId) -> Result<(), MarketplaceError> {
        for mut offer in self.storage.offers_for_application(application_id)? {
            if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Declined;
                offer.decided_at = Some(Utc::now());
                self.storage.update_offer(offer)?;
            }
        }
        Ok(())
    }

    /// Best-effort delivery: a failed notification is logged and swallowed,
    /// never unwinding the transition that produced it.
    fn dispatch(&self, event: NotificationEvent) {
        let kind = event.kind();
        if let Err(err) = self.notifier.notify(event) {
            warn!(kind, error = %err, "notification delivery failed");
        }
    }
}
