//! Job-marketplace core: the application lifecycle state machine spanning
//! applications, offers, and interviews, plus the authorization guard and
//! notification side effects around it.
//!
//! The module is layered leaves-first: `domain` owns the data model and the
//! status edge relation, `storage` and `notify` are the outbound contracts,
//! `auth` is a pure guard over an explicit [`auth::Actor`], and `service`
//! composes them. `router` is the thin HTTP adapter on top.

pub mod auth;
pub mod domain;
pub mod notify;
pub mod router;
pub mod service;
pub mod sessions;
pub mod storage;

#[cfg(test)]
mod tests;

pub use auth::{AccessError, Actor, MINIMUM_APPLICANT_AGE};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, AudienceConstraints, Interview, InterviewId,
    InterviewKind, InterviewStatus, Job, JobFilters, JobId, JobType, JobUpdate, NewApplication,
    NewInterview, NewJob, NewOffer, NewUser, NewVerification, Offer, OfferId, OfferStatus, Role,
    SubscriptionTier, TransitionEntry, User, UserId, VerificationDecision, VerificationId,
    VerificationRequest, VerificationStatus,
};
pub use notify::{NotificationEvent, Notifier, NotifyError};
pub use router::marketplace_router;
pub use service::{MarketplaceError, MarketplaceService};
pub use storage::{Storage, StorageError};
