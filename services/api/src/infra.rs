use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use jobmarket::marketplace::domain::{
    Application, ApplicationId, Interview, InterviewId, Job, JobFilters, JobId, Offer, OfferId,
    TransitionEntry, User, UserId, VerificationId, VerificationRequest, VerificationStatus,
};
use jobmarket::marketplace::notify::{NotificationEvent, Notifier, NotifyError};
use jobmarket::marketplace::storage::{Storage, StorageError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("storage mutex poisoned")
}

/// Process-local persistence backend. Every table is a plain map guarded by
/// its own mutex; cross-table consistency comes from the service layer
/// holding each record's optimistic version.
#[derive(Default)]
pub(crate) struct InMemoryStorage {
    users: Mutex<HashMap<UserId, User>>,
    credentials: Mutex<HashMap<String, (String, UserId)>>,
    jobs: Mutex<HashMap<JobId, Job>>,
    applications: Mutex<HashMap<ApplicationId, Application>>,
    transitions: Mutex<Vec<TransitionEntry>>,
    offers: Mutex<HashMap<OfferId, Offer>>,
    interviews: Mutex<HashMap<InterviewId, Interview>>,
    verifications: Mutex<HashMap<VerificationId, VerificationRequest>>,
}

fn sorted_by<T: Clone, K: Ord, F>(values: impl Iterator<Item = T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> K,
{
    let mut collected: Vec<T> = values.collect();
    collected.sort_by_key(|value| key(value));
    collected
}

impl Storage for InMemoryStorage {
    fn create_user(&self, user: User, password: &str) -> Result<User, StorageError> {
        let mut users = lock(&self.users);
        if users.contains_key(&user.id) {
            return Err(StorageError::Conflict);
        }
        lock(&self.credentials).insert(user.email.clone(), (password.to_string(), user.id));
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(lock(&self.users)
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StorageError> {
        let user_id = match lock(&self.credentials).get(email) {
            Some((stored, user_id)) if stored == password => *user_id,
            _ => return Ok(None),
        };
        self.user(user_id)
    }

    fn update_user(&self, user: User) -> Result<(), StorageError> {
        match lock(&self.users).get_mut(&user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn create_job(&self, job: Job) -> Result<Job, StorageError> {
        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(&job.id) {
            return Err(StorageError::Conflict);
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StorageError> {
        Ok(lock(&self.jobs).get(&id).cloned())
    }

    fn jobs(&self, filters: &JobFilters) -> Result<Vec<Job>, StorageError> {
        Ok(sorted_by(
            lock(&self.jobs)
                .values()
                .filter(|job| filters.matches(job))
                .cloned(),
            |job| job.id,
        ))
    }

    fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, StorageError> {
        Ok(sorted_by(
            lock(&self.jobs)
                .values()
                .filter(|job| job.employer_id == employer_id)
                .cloned(),
            |job| job.id,
        ))
    }

    fn update_job(&self, job: Job) -> Result<(), StorageError> {
        match lock(&self.jobs).get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn delete_job(&self, id: JobId) -> Result<(), StorageError> {
        if lock(&self.jobs).remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }

        let mut applications = lock(&self.applications);
        let doomed: Vec<ApplicationId> = applications
            .values()
            .filter(|application| application.job_id == id)
            .map(|application| application.id)
            .collect();
        applications.retain(|_, application| application.job_id != id);
        drop(applications);

        lock(&self.offers).retain(|_, offer| !doomed.contains(&offer.application_id));
        lock(&self.interviews).retain(|_, interview| !doomed.contains(&interview.application_id));
        lock(&self.transitions).retain(|entry| !doomed.contains(&entry.application_id));
        Ok(())
    }

    fn create_application(&self, application: Application) -> Result<Application, StorageError> {
        let mut applications = lock(&self.applications);
        if applications.contains_key(&application.id) {
            return Err(StorageError::Conflict);
        }
        applications.insert(application.id, application.clone());
        Ok(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StorageError> {
        Ok(lock(&self.applications).get(&id).cloned())
    }

    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError> {
        Ok(sorted_by(
            lock(&self.applications)
                .values()
                .filter(|application| application.job_id == job_id)
                .cloned(),
            |application| application.id,
        ))
    }

    fn applications_for_applicant(
        &self,
        applicant_id: UserId,
    ) -> Result<Vec<Application>, StorageError> {
        Ok(sorted_by(
            lock(&self.applications)
                .values()
                .filter(|application| application.applicant_id == applicant_id)
                .cloned(),
            |application| application.id,
        ))
    }

    fn update_application(
        &self,
        mut application: Application,
    ) -> Result<Application, StorageError> {
        let mut applications = lock(&self.applications);
        let stored = applications
            .get_mut(&application.id)
            .ok_or(StorageError::NotFound)?;
        if stored.version != application.version {
            return Err(StorageError::StaleWrite);
        }
        application.version += 1;
        *stored = application.clone();
        Ok(application)
    }

    fn record_transition(&self, entry: TransitionEntry) -> Result<(), StorageError> {
        lock(&self.transitions).push(entry);
        Ok(())
    }

    fn transitions_for(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<TransitionEntry>, StorageError> {
        Ok(lock(&self.transitions)
            .iter()
            .filter(|entry| entry.application_id == application_id)
            .cloned()
            .collect())
    }

    fn create_offer(&self, offer: Offer) -> Result<Offer, StorageError> {
        let mut offers = lock(&self.offers);
        if offers.contains_key(&offer.id) {
            return Err(StorageError::Conflict);
        }
        offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn offer(&self, id: OfferId) -> Result<Option<Offer>, StorageError> {
        Ok(lock(&self.offers).get(&id).cloned())
    }

    fn offers_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Offer>, StorageError> {
        Ok(sorted_by(
            lock(&self.offers)
                .values()
                .filter(|offer| offer.application_id == application_id)
                .cloned(),
            |offer| offer.id,
        ))
    }

    fn update_offer(&self, offer: Offer) -> Result<(), StorageError> {
        match lock(&self.offers).get_mut(&offer.id) {
            Some(slot) => {
                *slot = offer;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn create_interview(&self, interview: Interview) -> Result<Interview, StorageError> {
        let mut interviews = lock(&self.interviews);
        if interviews.contains_key(&interview.id) {
            return Err(StorageError::Conflict);
        }
        interviews.insert(interview.id, interview.clone());
        Ok(interview)
    }

    fn interview(&self, id: InterviewId) -> Result<Option<Interview>, StorageError> {
        Ok(lock(&self.interviews).get(&id).cloned())
    }

    fn interviews_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Interview>, StorageError> {
        Ok(sorted_by(
            lock(&self.interviews)
                .values()
                .filter(|interview| interview.application_id == application_id)
                .cloned(),
            |interview| interview.id,
        ))
    }

    fn update_interview(&self, interview: Interview) -> Result<(), StorageError> {
        match lock(&self.interviews).get_mut(&interview.id) {
            Some(slot) => {
                *slot = interview;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn create_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationRequest, StorageError> {
        let mut verifications = lock(&self.verifications);
        if verifications.contains_key(&request.id) {
            return Err(StorageError::Conflict);
        }
        verifications.insert(request.id, request.clone());
        Ok(request)
    }

    fn verification(
        &self,
        id: VerificationId,
    ) -> Result<Option<VerificationRequest>, StorageError> {
        Ok(lock(&self.verifications).get(&id).cloned())
    }

    fn verification_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationRequest>, StorageError> {
        Ok(lock(&self.verifications)
            .values()
            .filter(|request| request.user_id == user_id)
            .max_by_key(|request| request.id)
            .cloned())
    }

    fn pending_verifications(&self) -> Result<Vec<VerificationRequest>, StorageError> {
        Ok(sorted_by(
            lock(&self.verifications)
                .values()
                .filter(|request| {
                    matches!(
                        request.status,
                        VerificationStatus::Pending | VerificationStatus::UnderReview
                    )
                })
                .cloned(),
            |request| request.id,
        ))
    }

    fn update_verification(&self, request: VerificationRequest) -> Result<(), StorageError> {
        match lock(&self.verifications).get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

/// Notification transport that writes events to the structured log. Stands in
/// for email/push until a real channel is wired up.
#[derive(Default)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&event)
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        info!(kind = event.kind(), %payload, "notification dispatched");
        Ok(())
    }
}
