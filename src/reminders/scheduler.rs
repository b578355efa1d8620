//! Reminder scheduler — one sleeping task per armed job.
//!
//! The job map is the only record of what is pending. Each entry carries a
//! token; a job that finishes removes its entry only while the token still
//! matches, so a re-armed replacement is never evicted by its predecessor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channels::{Channel, delivery};
use crate::config::{FunnelLinks, ReminderDelays};
use crate::error::DatabaseError;
use crate::reminders::job::{DelayClass, ReminderJob};
use crate::store::LeadStore;

struct ScheduledJob {
    token: Uuid,
    job: ReminderJob,
    handle: JoinHandle<()>,
}

type JobMap = Arc<Mutex<HashMap<String, ScheduledJob>>>;

/// Arms, cancels and fires follow-up reminders.
pub struct ReminderScheduler {
    store: Arc<dyn LeadStore>,
    channel: Arc<dyn Channel>,
    delays: ReminderDelays,
    links: Arc<FunnelLinks>,
    jobs: JobMap,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn LeadStore>,
        channel: Arc<dyn Channel>,
        delays: ReminderDelays,
        links: FunnelLinks,
    ) -> Self {
        Self {
            store,
            channel,
            delays,
            links: Arc::new(links),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the user's pending reminders with a fresh set of three.
    pub async fn arm(&self, user_id: &str) {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        let cancelled = Self::cancel_locked(&mut jobs, user_id);

        for class in DelayClass::ALL {
            let delay = class.delay(&self.delays);
            let fire_at = now
                .checked_add_signed(to_time_delta(delay))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let job = ReminderJob::new(user_id, class, fire_at);
            self.schedule_locked(&mut jobs, job, delay);
        }

        tracing::debug!(user_id, cancelled, "Reminders armed");
    }

    /// Abort all of the user's pending reminders. Returns how many were pending.
    pub async fn cancel(&self, user_id: &str) -> usize {
        let mut jobs = self.jobs.lock().await;
        Self::cancel_locked(&mut jobs, user_id)
    }

    pub async fn pending_count(&self, user_id: &str) -> usize {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|s| s.job.user_id == user_id)
            .count()
    }

    /// All pending jobs, soonest first.
    pub async fn pending_jobs(&self) -> Vec<ReminderJob> {
        let mut pending: Vec<ReminderJob> = self
            .jobs
            .lock()
            .await
            .values()
            .map(|s| s.job.clone())
            .collect();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.name.cmp(&b.name)));
        pending
    }

    /// Re-create reminders lost to a restart.
    ///
    /// Only classes whose fire time is still ahead and whose guard holds now
    /// are scheduled. Elapsed reminders are dropped. Returns how many were
    /// scheduled.
    pub async fn recover(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now();
        let cutoff = now
            .checked_sub_signed(to_time_delta(self.delays.long))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let leads = self.store.list_started_since(cutoff).await?;

        let mut jobs = self.jobs.lock().await;
        let mut scheduled = 0;
        for lead in leads {
            let Some(started_at) = lead.started_at else {
                continue;
            };
            for class in DelayClass::ALL {
                let Some(fire_at) =
                    started_at.checked_add_signed(to_time_delta(class.delay(&self.delays)))
                else {
                    continue;
                };
                if fire_at <= now || !class.allows(lead.stage) {
                    continue;
                }
                let remaining = (fire_at - now).to_std().unwrap_or_default();
                if let Some(previous) = jobs.remove(&class.job_name(&lead.user_id)) {
                    previous.handle.abort();
                }
                self.schedule_locked(&mut jobs, ReminderJob::new(&lead.user_id, class, fire_at), remaining);
                scheduled += 1;
            }
        }

        tracing::info!(scheduled, "Reminders recovered");
        Ok(scheduled)
    }

    fn cancel_locked(jobs: &mut HashMap<String, ScheduledJob>, user_id: &str) -> usize {
        let mut cancelled = 0;
        for class in DelayClass::ALL {
            if let Some(scheduled) = jobs.remove(&class.job_name(user_id)) {
                scheduled.handle.abort();
                cancelled += 1;
            }
        }
        cancelled
    }

    fn schedule_locked(
        &self,
        jobs: &mut HashMap<String, ScheduledJob>,
        job: ReminderJob,
        delay: Duration,
    ) {
        let token = Uuid::new_v4();
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.store),
            Arc::clone(&self.channel),
            Arc::clone(&self.links),
            Arc::clone(&self.jobs),
            job.clone(),
            token,
            delay,
        ));
        jobs.insert(job.name.clone(), ScheduledJob { token, job, handle });
    }
}

async fn run_job(
    store: Arc<dyn LeadStore>,
    channel: Arc<dyn Channel>,
    links: Arc<FunnelLinks>,
    jobs: JobMap,
    job: ReminderJob,
    token: Uuid,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    fire(store.as_ref(), channel.as_ref(), &links, &job).await;

    let mut jobs = jobs.lock().await;
    if jobs.get(&job.name).is_some_and(|s| s.token == token) {
        jobs.remove(&job.name);
    }
}

/// Re-read the lead and send the reminder if its guard still holds.
async fn fire(store: &dyn LeadStore, channel: &dyn Channel, links: &FunnelLinks, job: &ReminderJob) {
    match store.get(&job.user_id).await {
        Ok(Some(lead)) if job.class.allows(lead.stage) => {
            tracing::info!(user_id = %job.user_id, job = %job.name, "Sending reminder");
            delivery::send(channel, &job.user_id, &job.class.message(links)).await;
        }
        Ok(Some(lead)) => {
            tracing::debug!(job = %job.name, stage = %lead.stage, "Reminder guard not met");
        }
        Ok(None) => {
            tracing::debug!(job = %job.name, "Reminder for unknown lead");
        }
        Err(e) => {
            tracing::warn!(job = %job.name, "Reminder skipped, lead lookup failed: {e}");
        }
    }
}

fn to_time_delta(delay: Duration) -> TimeDelta {
    TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX)
}
