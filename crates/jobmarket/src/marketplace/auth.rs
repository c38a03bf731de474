use super::domain::{Application, Job, Role, User, UserId};

/// Minimum age for submitting an application.
pub const MINIMUM_APPLICANT_AGE: u16 = 16;

/// Snapshot of the acting user, resolved once per request and threaded
/// explicitly into the lifecycle service. No ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    pub age: Option<u16>,
    pub is_verified: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            age: user.age,
            is_verified: user.is_verified,
        }
    }
}

/// Outcome of a failed access check. Pure data; the guard performs no side
/// effects.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
}

fn forbidden(message: &str) -> AccessError {
    AccessError::Forbidden(message.to_string())
}

/// Posting jobs is open to employers and admins.
pub fn ensure_can_post_jobs(actor: &Actor) -> Result<(), AccessError> {
    match actor.role {
        Role::Employer | Role::Admin => Ok(()),
        Role::Applicant => Err(forbidden("only employers can post jobs")),
    }
}

/// Job mutation: the owning employer or an admin.
pub fn ensure_job_owner(actor: &Actor, job: &Job) -> Result<(), AccessError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Employer if job.employer_id == actor.id => Ok(()),
        Role::Employer | Role::Applicant => {
            Err(forbidden("only the posting employer can modify this job"))
        }
    }
}

/// Application status moves, offers, and interviews belong to the employer
/// owning the job. Admins pass for the reset override.
pub fn ensure_manages_application(actor: &Actor, job: &Job) -> Result<(), AccessError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Employer if job.employer_id == actor.id => Ok(()),
        Role::Employer => Err(forbidden(
            "only the employer who posted this job can manage its applications",
        )),
        Role::Applicant => Err(forbidden("applicants cannot manage application status")),
    }
}

/// Read access to a single application: the applicant, the job owner, or an
/// admin.
pub fn ensure_can_view_application(
    actor: &Actor,
    application: &Application,
    job: &Job,
) -> Result<(), AccessError> {
    match actor.role {
        Role::Admin => Ok(()),
        _ if application.applicant_id == actor.id => Ok(()),
        _ if job.employer_id == actor.id => Ok(()),
        _ => Err(forbidden("no access to this application")),
    }
}

/// Submitting applications requires the applicant role and a stated age of
/// at least sixteen.
pub fn ensure_can_apply(actor: &Actor) -> Result<(), AccessError> {
    match actor.role {
        Role::Applicant => {}
        Role::Employer | Role::Admin => {
            return Err(forbidden("only applicants can apply to jobs"));
        }
    }
    match actor.age {
        Some(age) if age >= MINIMUM_APPLICANT_AGE => Ok(()),
        Some(_) => Err(forbidden("applicants must be at least 16 years old")),
        None => Err(forbidden("profile age is required before applying")),
    }
}

/// Cancelling is reserved to the verified applicant who owns the
/// application, and never once it was accepted.
pub fn ensure_can_cancel(actor: &Actor, application: &Application) -> Result<(), AccessError> {
    if application.applicant_id != actor.id {
        return Err(forbidden("only the applicant can cancel this application"));
    }
    if !actor.is_verified {
        return Err(forbidden(
            "account must be verified before cancelling applications",
        ));
    }
    if application.status == super::domain::ApplicationStatus::Accepted {
        return Err(forbidden("an accepted application cannot be cancelled"));
    }
    Ok(())
}

/// Offer responses come from the applicant on that offer's application only.
pub fn ensure_offer_recipient(actor: &Actor, application: &Application) -> Result<(), AccessError> {
    if application.applicant_id == actor.id {
        Ok(())
    } else {
        Err(forbidden("only the applicant can respond to this offer"))
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), AccessError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Applicant | Role::Employer => Err(forbidden("admin access required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{
        Application, ApplicationId, ApplicationStatus, AudienceConstraints, Job, JobId, JobType,
    };
    use chrono::Utc;

    fn actor(id: u64, role: Role) -> Actor {
        Actor {
            id: UserId(id),
            role,
            age: Some(25),
            is_verified: true,
        }
    }

    fn job_owned_by(employer: u64) -> Job {
        Job {
            id: JobId(7),
            employer_id: UserId(employer),
            title: "Warehouse picker".to_string(),
            description: "Night shifts".to_string(),
            category: "Logistics".to_string(),
            location: "Riga".to_string(),
            job_type: JobType::Casual,
            salary_min: 700,
            salary_max: 900,
            is_active: true,
            audience: AudienceConstraints::default(),
            created_at: Utc::now(),
        }
    }

    fn application_by(applicant: u64, status: ApplicationStatus) -> Application {
        Application {
            id: ApplicationId(11),
            job_id: JobId(7),
            applicant_id: UserId(applicant),
            status,
            message: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn job_mutation_is_owner_or_admin() {
        let job = job_owned_by(1);
        assert!(ensure_job_owner(&actor(1, Role::Employer), &job).is_ok());
        assert!(ensure_job_owner(&actor(2, Role::Admin), &job).is_ok());
        assert!(matches!(
            ensure_job_owner(&actor(2, Role::Employer), &job),
            Err(AccessError::Forbidden(_))
        ));
    }

    #[test]
    fn applicants_never_manage_status() {
        let job = job_owned_by(1);
        assert!(matches!(
            ensure_manages_application(&actor(1, Role::Applicant), &job),
            Err(AccessError::Forbidden(_))
        ));
    }

    #[test]
    fn age_gate_applies_before_anything_else() {
        let mut young = actor(3, Role::Applicant);
        young.age = Some(15);
        assert!(matches!(
            ensure_can_apply(&young),
            Err(AccessError::Forbidden(_))
        ));

        let mut unknown = actor(3, Role::Applicant);
        unknown.age = None;
        assert!(ensure_can_apply(&unknown).is_err());

        assert!(ensure_can_apply(&actor(3, Role::Applicant)).is_ok());
        assert!(ensure_can_apply(&actor(3, Role::Employer)).is_err());
    }

    #[test]
    fn cancel_requires_verified_owner_and_non_accepted_state() {
        let application = application_by(5, ApplicationStatus::Pending);
        assert!(ensure_can_cancel(&actor(5, Role::Applicant), &application).is_ok());

        let mut unverified = actor(5, Role::Applicant);
        unverified.is_verified = false;
        assert!(ensure_can_cancel(&unverified, &application).is_err());

        assert!(ensure_can_cancel(&actor(6, Role::Applicant), &application).is_err());

        let accepted = application_by(5, ApplicationStatus::Accepted);
        assert!(ensure_can_cancel(&actor(5, Role::Applicant), &accepted).is_err());
    }

    #[test]
    fn offer_response_is_applicant_only() {
        let application = application_by(5, ApplicationStatus::Offered);
        assert!(ensure_offer_recipient(&actor(5, Role::Applicant), &application).is_ok());
        assert!(ensure_offer_recipient(&actor(1, Role::Employer), &application).is_err());
    }
}
