use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationStatus, InterviewId, JobId, OfferId, OfferStatus, UserId,
    VerificationStatus,
};

/// Everything the dispatcher may be asked to deliver. Each variant carries
/// the ids a mail adapter needs to address and render the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    ApplicationSubmitted {
        application_id: ApplicationId,
        job_id: JobId,
        applicant_id: UserId,
        employer_id: UserId,
    },
    ApplicationStatusChanged {
        application_id: ApplicationId,
        applicant_id: UserId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    OfferSent {
        offer_id: OfferId,
        application_id: ApplicationId,
        applicant_id: UserId,
        salary: u32,
    },
    OfferResponded {
        offer_id: OfferId,
        application_id: ApplicationId,
        employer_id: UserId,
        response: OfferStatus,
    },
    InterviewScheduled {
        interview_id: InterviewId,
        application_id: ApplicationId,
        applicant_id: UserId,
    },
    InterviewCancelled {
        interview_id: InterviewId,
        application_id: ApplicationId,
        applicant_id: UserId,
    },
    VerificationDecided {
        user_id: UserId,
        status: VerificationStatus,
    },
}

impl NotificationEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::ApplicationSubmitted { .. } => "application_submitted",
            NotificationEvent::ApplicationStatusChanged { .. } => "application_status_changed",
            NotificationEvent::OfferSent { .. } => "offer_sent",
            NotificationEvent::OfferResponded { .. } => "offer_responded",
            NotificationEvent::InterviewScheduled { .. } => "interview_scheduled",
            NotificationEvent::InterviewCancelled { .. } => "interview_cancelled",
            NotificationEvent::VerificationDecided { .. } => "verification_decided",
        }
    }
}

/// Outbound delivery hook (e-mail adapters in production, memory in tests).
/// Calls are best-effort: the lifecycle service logs a failure and moves on,
/// never rolling back the transition that triggered it.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
