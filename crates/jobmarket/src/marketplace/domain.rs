use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier assigned to registered users.
    UserId
);
id_newtype!(JobId);
id_newtype!(ApplicationId);
id_newtype!(OfferId);
id_newtype!(InterviewId);
id_newtype!(VerificationId);

/// Closed set of roles a user can hold. Authorization matches on this
/// exhaustively; there is no ad-hoc role string anywhere in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Employer,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Applicant => "applicant",
            Role::Employer => "employer",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

/// Registered account. Credentials never live on this struct; they stay
/// behind the storage contract so responses cannot leak them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub age: Option<u16>,
    pub bio: Option<String>,
    pub cv_url: Option<String>,
    pub location: Option<String>,
    pub company_name: Option<String>,
    pub is_verified: bool,
    pub subscription: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}

/// Payload handed to the storage layer when registering an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub age: Option<u16>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Casual,
    Contract,
}

/// Optional bounds a posting may place on who can apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceConstraints {
    #[serde(default)]
    pub min_age: Option<u16>,
    #[serde(default)]
    pub max_age: Option<u16>,
}

impl AudienceConstraints {
    pub fn admits_age(&self, age: u16) -> bool {
        if let Some(min) = self.min_age {
            if age < min {
                return false;
            }
        }
        if let Some(max) = self.max_age {
            if age > max {
                return false;
            }
        }
        true
    }
}

/// Posting owned by exactly one employer. The owner never changes after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub employer_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub job_type: JobType,
    pub salary_min: u32,
    pub salary_max: u32,
    pub is_active: bool,
    #[serde(default)]
    pub audience: AudienceConstraints,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub job_type: JobType,
    pub salary_min: u32,
    pub salary_max: u32,
    #[serde(default)]
    pub audience: AudienceConstraints,
}

/// Patch applied to an existing job. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub audience: Option<AudienceConstraints>,
}

/// Conjunctive filter set for the public listing. `only_active` is forced on
/// by the public endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilters {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub min_salary: Option<u32>,
    #[serde(default)]
    pub max_salary: Option<u32>,
    #[serde(skip)]
    pub only_active: bool,
}

impl JobFilters {
    /// Whether a job satisfies every present filter. Salary bounds match
    /// against the job's advertised range, not a single point.
    pub fn matches(&self, job: &Job) -> bool {
        if self.only_active && !job.is_active {
            return false;
        }
        if let Some(category) = &self.category {
            if !job.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !job
                .location
                .to_ascii_lowercase()
                .contains(&location.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(job_type) = self.job_type {
            if job.job_type != job_type {
                return false;
            }
        }
        if let Some(min) = self.min_salary {
            if job.salary_max < min {
                return false;
            }
        }
        if let Some(max) = self.max_salary {
            if job.salary_min > max {
                return false;
            }
        }
        true
    }
}

/// Lifecycle states of an application. The edge relation is the single
/// source of truth for which moves exist; everything else layers
/// authorization on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Offered,
    Accepted,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the state machine defines an edge from `self` to `next`.
    /// Reset-to-pending is the override edge and is open from every state.
    pub fn allows(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match (self, next) {
            (_, Pending) => true,
            (Pending, Offered) => true,
            (Pending, Rejected) | (Offered, Rejected) => true,
            (Offered, Accepted) => true,
            (Pending, Cancelled) | (Offered, Cancelled) | (Rejected, Cancelled) => true,
            _ => false,
        }
    }

    /// A live application blocks a second application to the same job.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending | ApplicationStatus::Offered | ApplicationStatus::Accepted
        )
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One applicant's request to be considered for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    /// Optimistic-lock counter, bumped by the storage layer on every write.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub job_id: JobId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
}

/// Concrete compensation proposal attached to an offered application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub application_id: ApplicationId,
    pub salary: u32,
    pub compensation_notes: Option<String>,
    pub note: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    #[serde(default)]
    pub salary: Option<u32>,
    #[serde(default)]
    pub compensation_notes: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewKind {
    InPerson,
    Phone,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Cancelled,
}

/// Scheduled meeting tied to an application. At most one may be in the
/// `scheduled` state per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: InterviewKind,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInterview {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: InterviewKind,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

/// Identity-proof request reviewed by an admin. Approval flips the user's
/// trust badge; a rejected request may be resubmitted as a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: VerificationId,
    pub user_id: UserId,
    pub id_type: String,
    pub id_number: String,
    pub document_keys: Vec<String>,
    pub status: VerificationStatus,
    pub admin_notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Admin verdict on a verification request.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationDecision {
    pub status: VerificationStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVerification {
    pub id_type: String,
    pub id_number: String,
    #[serde(default)]
    pub document_keys: Vec<String>,
}

/// Audit record written for every application status change, including the
/// admin reset override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub application_id: ApplicationId,
    pub actor_id: UserId,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_edges_match_the_lifecycle() {
        use ApplicationStatus::*;

        assert!(Pending.allows(Offered));
        assert!(Pending.allows(Rejected));
        assert!(Offered.allows(Accepted));
        assert!(Offered.allows(Rejected));
        assert!(Offered.allows(Cancelled));

        // The reset override is open from everywhere.
        for status in [Pending, Offered, Accepted, Rejected, Cancelled] {
            assert!(status.allows(Pending));
        }

        assert!(!Pending.allows(Accepted));
        assert!(!Accepted.allows(Cancelled));
        assert!(!Accepted.allows(Rejected));
        assert!(!Rejected.allows(Offered));
        assert!(!Cancelled.allows(Offered));
    }

    #[test]
    fn live_statuses_block_duplicates() {
        assert!(ApplicationStatus::Pending.is_live());
        assert!(ApplicationStatus::Offered.is_live());
        assert!(ApplicationStatus::Accepted.is_live());
        assert!(!ApplicationStatus::Rejected.is_live());
        assert!(!ApplicationStatus::Cancelled.is_live());
    }

    #[test]
    fn filters_are_conjunctive() {
        let job = Job {
            id: JobId(1),
            employer_id: UserId(1),
            title: "Office cleaner".to_string(),
            description: "Evening shifts".to_string(),
            category: "Cleaning".to_string(),
            location: "Riga, Centrs".to_string(),
            job_type: JobType::PartTime,
            salary_min: 5000,
            salary_max: 10000,
            is_active: true,
            audience: AudienceConstraints::default(),
            created_at: Utc::now(),
        };

        let mut filters = JobFilters {
            category: Some("cleaning".to_string()),
            location: Some("riga".to_string()),
            job_type: Some(JobType::PartTime),
            min_salary: Some(6000),
            max_salary: Some(9000),
            only_active: true,
        };
        assert!(filters.matches(&job));

        filters.min_salary = Some(12000);
        assert!(!filters.matches(&job));

        filters.min_salary = Some(6000);
        filters.category = Some("Logistics".to_string());
        assert!(!filters.matches(&job));
    }

    #[test]
    fn audience_bounds_admit_inclusive_edges() {
        let audience = AudienceConstraints {
            min_age: Some(18),
            max_age: Some(30),
        };
        assert!(audience.admits_age(18));
        assert!(audience.admits_age(30));
        assert!(!audience.admits_age(17));
        assert!(!audience.admits_age(31));
        assert!(AudienceConstraints::default().admits_age(99));
    }
}
