use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::auth::Actor;
use crate::marketplace::domain::{
    Application, ApplicationId, Interview, InterviewId, InterviewKind, Job, JobFilters, JobId,
    JobType, NewApplication, NewInterview, NewJob, NewOffer, NewUser, Offer, OfferId, Role,
    TransitionEntry, User, UserId, VerificationId, VerificationRequest,
};
use crate::marketplace::notify::{NotificationEvent, Notifier, NotifyError};
use crate::marketplace::service::MarketplaceService;
use crate::marketplace::storage::{Storage, StorageError};

pub(super) type TestService = MarketplaceService<MemoryStorage, MemoryNotifier>;

static EMAIL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn unique_email(prefix: &str) -> String {
    let serial = EMAIL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{serial}@example.com")
}

pub(super) fn test_config() -> MarketplaceConfig {
    MarketplaceConfig {
        free_tier_job_limit: 2,
        admin_bootstrap: None,
    }
}

pub(super) fn build_service() -> (Arc<TestService>, Arc<MemoryStorage>, Arc<MemoryNotifier>) {
    let storage = Arc::new(MemoryStorage::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = Arc::new(MarketplaceService::new(
        storage.clone(),
        notifier.clone(),
        test_config(),
    ));
    (service, storage, notifier)
}

pub(super) fn register_role<S, N>(
    service: &MarketplaceService<S, N>,
    role: Role,
    age: Option<u16>,
) -> Actor
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    let user = service
        .register(NewUser {
            email: unique_email(role.label()),
            password: "correct-horse".to_string(),
            first_name: "Test".to_string(),
            last_name: "Person".to_string(),
            role: Some(role),
            age,
            location: None,
            company_name: None,
        })
        .expect("registration succeeds");
    Actor::from(&user)
}

pub(super) fn employer_actor<S, N>(service: &MarketplaceService<S, N>) -> Actor
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    register_role(service, Role::Employer, None)
}

pub(super) fn applicant_actor<S, N>(service: &MarketplaceService<S, N>, age: u16) -> Actor
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    register_role(service, Role::Applicant, Some(age))
}

pub(super) fn admin_actor<S, N>(service: &MarketplaceService<S, N>) -> Actor
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    let user = service
        .bootstrap_admin(&unique_email("admin"), "correct-horse")
        .expect("admin bootstrap succeeds");
    Actor::from(&user)
}

/// Flip the trust badge directly through the storage double, the way an
/// approved verification would.
pub(super) fn verify_actor<S: Storage>(storage: &S, actor: Actor) -> Actor {
    let mut user = storage
        .user(actor.id)
        .expect("storage reachable")
        .expect("user exists");
    user.is_verified = true;
    storage.update_user(user.clone()).expect("update succeeds");
    Actor::from(&user)
}

pub(super) fn verified_applicant<S, N>(
    service: &MarketplaceService<S, N>,
    storage: &S,
    age: u16,
) -> Actor
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    verify_actor(storage, applicant_actor(service, age))
}

pub(super) fn sample_job() -> NewJob {
    NewJob {
        title: "Office cleaner".to_string(),
        description: "Weekday evening shifts in the city centre".to_string(),
        category: "Cleaning".to_string(),
        location: "Riga".to_string(),
        job_type: JobType::PartTime,
        salary_min: 5000,
        salary_max: 10000,
        audience: Default::default(),
    }
}

pub(super) fn post_sample_job<S, N>(service: &MarketplaceService<S, N>, employer: &Actor) -> Job
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    service
        .post_job(employer, sample_job())
        .expect("job posts cleanly")
}

pub(super) fn apply_to<S, N>(
    service: &MarketplaceService<S, N>,
    applicant: &Actor,
    job: &Job,
) -> Application
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    service
        .apply(
            applicant,
            NewApplication {
                job_id: job.id,
                message: Some("I can start next week".to_string()),
            },
        )
        .expect("application submits cleanly")
}

pub(super) fn offer_of(salary: u32) -> NewOffer {
    NewOffer {
        salary: Some(salary),
        compensation_notes: Some("monthly, before taxes".to_string()),
        note: None,
    }
}

pub(super) fn video_interview() -> NewInterview {
    NewInterview {
        date: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
        time: NaiveTime::from_hms_opt(10, 30, 0).expect("valid time"),
        kind: InterviewKind::Video,
        location: None,
        meeting_link: Some("https://meet.example.com/abc".to_string()),
        notes: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryStorage {
    users: Mutex<HashMap<UserId, User>>,
    credentials: Mutex<HashMap<String, (String, UserId)>>,
    jobs: Mutex<HashMap<JobId, Job>>,
    applications: Mutex<HashMap<ApplicationId, Application>>,
    transitions: Mutex<Vec<TransitionEntry>>,
    offers: Mutex<HashMap<OfferId, Offer>>,
    interviews: Mutex<HashMap<InterviewId, Interview>>,
    verifications: Mutex<HashMap<VerificationId, VerificationRequest>>,
    /// While set, every application write loses the optimistic version race.
    pub(super) contested: AtomicBool,
}

impl Storage for MemoryStorage {
    fn create_user(&self, user: User, password: &str) -> Result<User, StorageError> {
        let mut users = self.users.lock().expect("storage mutex poisoned");
        if users.contains_key(&user.id) {
            return Err(StorageError::Conflict);
        }
        self.credentials
            .lock()
            .expect("storage mutex poisoned")
            .insert(user.email.clone(), (password.to_string(), user.id));
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .expect("storage mutex poisoned")
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StorageError> {
        let credentials = self.credentials.lock().expect("storage mutex poisoned");
        match credentials.get(email) {
            Some((stored, user_id)) if stored == password => self.user(*user_id),
            _ => Ok(None),
        }
    }

    fn update_user(&self, user: User) -> Result<(), StorageError> {
        let mut users = self.users.lock().expect("storage mutex poisoned");
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn create_job(&self, job: Job) -> Result<Job, StorageError> {
        let mut jobs = self.jobs.lock().expect("storage mutex poisoned");
        if jobs.contains_key(&job.id) {
            return Err(StorageError::Conflict);
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StorageError> {
        Ok(self
            .jobs
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn jobs(&self, filters: &JobFilters) -> Result<Vec<Job>, StorageError> {
        let jobs = self.jobs.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|job| filters.matches(job))
            .cloned()
            .collect();
        matched.sort_by_key(|job| job.id);
        Ok(matched)
    }

    fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, StorageError> {
        let jobs = self.jobs.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|job| job.employer_id == employer_id)
            .cloned()
            .collect();
        matched.sort_by_key(|job| job.id);
        Ok(matched)
    }

    fn update_job(&self, job: Job) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock().expect("storage mutex poisoned");
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn delete_job(&self, id: JobId) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock().expect("storage mutex poisoned");
        if jobs.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        drop(jobs);

        // Cascade exactly like a foreign key with ON DELETE CASCADE would.
        let mut applications = self.applications.lock().expect("storage mutex poisoned");
        let doomed: Vec<ApplicationId> = applications
            .values()
            .filter(|application| application.job_id == id)
            .map(|application| application.id)
            .collect();
        applications.retain(|_, application| application.job_id != id);
        drop(applications);

        self.offers
            .lock()
            .expect("storage mutex poisoned")
            .retain(|_, offer| !doomed.contains(&offer.application_id));
        self.interviews
            .lock()
            .expect("storage mutex poisoned")
            .retain(|_, interview| !doomed.contains(&interview.application_id));
        self.transitions
            .lock()
            .expect("storage mutex poisoned")
            .retain(|entry| !doomed.contains(&entry.application_id));
        Ok(())
    }

    fn create_application(&self, application: Application) -> Result<Application, StorageError> {
        let mut applications = self.applications.lock().expect("storage mutex poisoned");
        if applications.contains_key(&application.id) {
            return Err(StorageError::Conflict);
        }
        applications.insert(application.id, application.clone());
        Ok(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StorageError> {
        Ok(self
            .applications
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError> {
        let applications = self.applications.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Application> = applications
            .values()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect();
        matched.sort_by_key(|application| application.id);
        Ok(matched)
    }

    fn applications_for_applicant(
        &self,
        applicant_id: UserId,
    ) -> Result<Vec<Application>, StorageError> {
        let applications = self.applications.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Application> = applications
            .values()
            .filter(|application| application.applicant_id == applicant_id)
            .cloned()
            .collect();
        matched.sort_by_key(|application| application.id);
        Ok(matched)
    }

    fn update_application(&self, mut application: Application) -> Result<Application, StorageError> {
        if self.contested.load(Ordering::Relaxed) {
            return Err(StorageError::StaleWrite);
        }
        let mut applications = self.applications.lock().expect("storage mutex poisoned");
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
        self.transitions
            .lock()
            .expect("storage mutex poisoned")
            .push(entry);
        Ok(())
    }

    fn transitions_for(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<TransitionEntry>, StorageError> {
        Ok(self
            .transitions
            .lock()
            .expect("storage mutex poisoned")
            .iter()
            .filter(|entry| entry.application_id == application_id)
            .cloned()
            .collect())
    }

    fn create_offer(&self, offer: Offer) -> Result<Offer, StorageError> {
        let mut offers = self.offers.lock().expect("storage mutex poisoned");
        if offers.contains_key(&offer.id) {
            return Err(StorageError::Conflict);
        }
        offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn offer(&self, id: OfferId) -> Result<Option<Offer>, StorageError> {
        Ok(self
            .offers
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn offers_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Offer>, StorageError> {
        let offers = self.offers.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Offer> = offers
            .values()
            .filter(|offer| offer.application_id == application_id)
            .cloned()
            .collect();
        matched.sort_by_key(|offer| offer.id);
        Ok(matched)
    }

    fn update_offer(&self, offer: Offer) -> Result<(), StorageError> {
        let mut offers = self.offers.lock().expect("storage mutex poisoned");
        match offers.get_mut(&offer.id) {
            Some(slot) => {
                *slot = offer;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn create_interview(&self, interview: Interview) -> Result<Interview, StorageError> {
        let mut interviews = self.interviews.lock().expect("storage mutex poisoned");
        if interviews.contains_key(&interview.id) {
            return Err(StorageError::Conflict);
        }
        interviews.insert(interview.id, interview.clone());
        Ok(interview)
    }

    fn interview(&self, id: InterviewId) -> Result<Option<Interview>, StorageError> {
        Ok(self
            .interviews
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn interviews_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<Interview>, StorageError> {
        let interviews = self.interviews.lock().expect("storage mutex poisoned");
        let mut matched: Vec<Interview> = interviews
            .values()
            .filter(|interview| interview.application_id == application_id)
            .cloned()
            .collect();
        matched.sort_by_key(|interview| interview.id);
        Ok(matched)
    }

    fn update_interview(&self, interview: Interview) -> Result<(), StorageError> {
        let mut interviews = self.interviews.lock().expect("storage mutex poisoned");
        match interviews.get_mut(&interview.id) {
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
        let mut verifications = self.verifications.lock().expect("storage mutex poisoned");
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
        Ok(self
            .verifications
            .lock()
            .expect("storage mutex poisoned")
            .get(&id)
            .cloned())
    }

    fn verification_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationRequest>, StorageError> {
        let verifications = self.verifications.lock().expect("storage mutex poisoned");
        Ok(verifications
            .values()
            .filter(|request| request.user_id == user_id)
            .max_by_key(|request| request.id)
            .cloned())
    }

    fn pending_verifications(&self) -> Result<Vec<VerificationRequest>, StorageError> {
        let verifications = self.verifications.lock().expect("storage mutex poisoned");
        let mut matched: Vec<VerificationRequest> = verifications
            .values()
            .filter(|request| {
                matches!(
                    request.status,
                    crate::marketplace::domain::VerificationStatus::Pending
                        | crate::marketplace::domain::VerificationStatus::UnderReview
                )
            })
            .cloned()
            .collect();
        matched.sort_by_key(|request| request.id);
        Ok(matched)
    }

    fn update_verification(&self, request: VerificationRequest) -> Result<(), StorageError> {
        let mut verifications = self.verifications.lock().expect("storage mutex poisoned");
        match verifications.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Transport that always fails, for asserting best-effort semantics.
pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp unreachable".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
