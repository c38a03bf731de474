use super::domain::{
    Application, ApplicationId, Interview, InterviewId, Job, JobFilters, JobId, Offer, OfferId,
    TransitionEntry, User, UserId, VerificationId, VerificationRequest,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently")]
    StaleWrite,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for the marketplace. Owns no business rules; the
/// lifecycle service composes these calls and enforces every invariant.
///
/// `update_application` must compare the incoming `version` against the
/// stored one, fail with [`StorageError::StaleWrite`] on mismatch, and bump
/// it on success. `delete_job` must cascade to the job's applications,
/// offers, and interviews.
pub trait Storage: Send + Sync {
    /// Store a freshly minted user together with their password. Credential
    /// handling stays behind the contract so it never crosses into the
    /// domain layer.
    fn create_user(&self, user: User, password: &str) -> Result<User, StorageError>;
    fn user(&self, id: UserId) -> Result<Option<User>, StorageError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    fn verify_credentials(&self, email: &str, password: &str)
        -> Result<Option<User>, StorageError>;
    fn update_user(&self, user: User) -> Result<(), StorageError>;

    fn create_job(&self, job: Job) -> Result<Job, StorageError>;
    fn job(&self, id: JobId) -> Result<Option<Job>, StorageError>;
    fn jobs(&self, filters: &JobFilters) -> Result<Vec<Job>, StorageError>;
    fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, StorageError>;
    fn update_job(&self, job: Job) -> Result<(), StorageError>;
    fn delete_job(&self, id: JobId) -> Result<(), StorageError>;

    fn create_application(&self, application: Application) -> Result<Application, StorageError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StorageError>;
    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError>;
    fn applications_for_applicant(
        &self,
        applicant_id: UserId,
    ) -> Result<Vec<Application>, StorageError>;
    fn update_application(&self, application: Application) -> Result<Application, StorageError>;
    fn record_transition(&self, entry: TransitionEntry) -> Result<(), StorageError>;
    fn transitions_for(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<TransitionEntry>, StorageError>;

    fn create_offer(&self, offer: Offer) -> Result<Offer, StorageError>;
    fn offer(&self, id: OfferId) -> Result<Option<Offer>, StorageError>;
    fn offers_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Offer>, StorageError>;
    fn update_offer(&self, offer: Offer) -> Result<(), StorageError>;

    fn create_interview(&self, interview: Interview) -> Result<Interview, StorageError>;
    fn interview(&self, id: InterviewId) -> Result<Option<Interview>, StorageError>;
    fn interviews_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Interview>, StorageError>;
    fn update_interview(&self, interview: Interview) -> Result<(), StorageError>;

    fn create_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationRequest, StorageError>;
    fn verification(&self, id: VerificationId)
        -> Result<Option<VerificationRequest>, StorageError>;
    fn verification_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationRequest>, StorageError>;
    fn pending_verifications(&self) -> Result<Vec<VerificationRequest>, StorageError>;
    fn update_verification(&self, request: VerificationRequest) -> Result<(), StorageError>;
}
