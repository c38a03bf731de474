use chrono::{Duration, Local, NaiveDate, NaiveTime};
use clap::Args;
use std::sync::{Arc, Mutex};

use crate::infra::InMemoryStorage;
use jobmarket::config::MarketplaceConfig;
use jobmarket::error::AppError;
use jobmarket::marketplace::auth::Actor;
use jobmarket::marketplace::domain::{
    InterviewKind, JobType, NewApplication, NewInterview, NewJob, NewOffer, NewUser, Role,
};
use jobmarket::marketplace::notify::{NotificationEvent, Notifier, NotifyError};
use jobmarket::marketplace::service::{MarketplaceError, MarketplaceService};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Offered monthly salary in cents of the listing currency
    #[arg(long, default_value_t = 8000)]
    pub(crate) salary: u32,
    /// Interview date (YYYY-MM-DD). Defaults to a week from today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) interview_date: Option<NaiveDate>,
    /// Have the applicant decline the offer instead of accepting it
    #[arg(long)]
    pub(crate) decline: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Notifier double for the demo; events are replayed at the end of the run.
#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    if let Err(err) = hire_flow(args) {
        println!("Demo aborted: {err}");
    }
    Ok(())
}

fn hire_flow(args: DemoArgs) -> Result<(), MarketplaceError> {
    let interview_date = args
        .interview_date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(7));

    let storage = Arc::new(InMemoryStorage::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = MarketplaceService::new(storage, notifier.clone(), MarketplaceConfig::default());

    println!("Job marketplace demo (in-memory deployment)");

    let employer = service.register(NewUser {
        email: "owner@brightclean.example".to_string(),
        password: "demo-password".to_string(),
        first_name: "Dace".to_string(),
        last_name: "Ozola".to_string(),
        role: Some(Role::Employer),
        age: None,
        location: Some("Riga".to_string()),
        company_name: Some("BrightClean SIA".to_string()),
    })?;
    let applicant = service.register(NewUser {
        email: "janis@example.com".to_string(),
        password: "demo-password".to_string(),
        first_name: "Janis".to_string(),
        last_name: "Berzins".to_string(),
        role: Some(Role::Applicant),
        age: Some(22),
        location: Some("Riga".to_string()),
        company_name: None,
    })?;
    let employer = Actor::from(&employer);
    let applicant = Actor::from(&applicant);
    println!("- Registered employer {} and applicant {}", employer.id.0, applicant.id.0);

    let job = service.post_job(
        &employer,
        NewJob {
            title: "Office cleaner".to_string(),
            description: "Weekday evening shifts in the city centre".to_string(),
            category: "Cleaning".to_string(),
            location: "Riga".to_string(),
            job_type: JobType::PartTime,
            salary_min: 5000,
            salary_max: 10000,
            audience: Default::default(),
        },
    )?;
    println!("- Posted job {} ({})", job.id.0, job.title);

    let application = service.apply(
        &applicant,
        NewApplication {
            job_id: job.id,
            message: Some("I can start next week".to_string()),
        },
    )?;
    println!(
        "- Application {} submitted -> status {}",
        application.id.0, application.status
    );

    let interview = service.schedule_interview(
        &employer,
        application.id,
        NewInterview {
            date: interview_date,
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            kind: InterviewKind::Video,
            location: None,
            meeting_link: Some("https://meet.example.com/hire".to_string()),
            notes: Some("Introductory call".to_string()),
        },
    )?;
    println!(
        "- Interview {} scheduled for {} at {}",
        interview.id.0, interview.date, interview.time
    );

    let offer = service.send_offer(
        &employer,
        application.id,
        NewOffer {
            salary: Some(args.salary),
            compensation_notes: Some("monthly, before taxes".to_string()),
            note: Some("Looking forward to working with you".to_string()),
        },
    )?;
    println!("- Offer {} sent at salary {}", offer.id.0, args.salary);

    let (offer, application) = service.respond_offer(&applicant, offer.id, !args.decline)?;
    println!(
        "- Applicant {} -> offer {:?}, application {}",
        if args.decline { "declined" } else { "accepted" },
        offer.status,
        application.status
    );

    println!("\nTransition history");
    for entry in service.application_history(&employer, application.id)? {
        println!(
            "- actor {} moved {} -> {} at {}",
            entry.actor_id.0, entry.from, entry.to, entry.at
        );
    }

    println!("\nDispatched notifications");
    for event in notifier.events() {
        match serde_json::to_string(&event) {
            Ok(json) => println!("- {json}"),
            Err(err) => println!("- {} (payload unavailable: {err})", event.kind()),
        }
    }

    Ok(())
}
