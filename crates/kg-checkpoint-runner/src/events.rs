//! Job lifecycle events and listener dispatch (spec §4.7 "Listeners are
//! isolated: a listener throwing must not block the pipeline; errors are
//! logged.").

use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

/// A lifecycle event emitted by [`crate::CheckpointRunner`].
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A job was persisted and admitted to the queue.
    Enqueued {
        /// The job's id.
        job_id: String,
    },
    /// Execution of a job attempt began.
    Started {
        /// The job's id.
        job_id: String,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// An attempt failed but the job will be retried.
    AttemptFailed {
        /// The job's id.
        job_id: String,
        /// 1-based attempt number that failed.
        attempt: u32,
        /// The failure's message.
        error: String,
    },
    /// A job finished successfully.
    Completed {
        /// The job's id.
        job_id: String,
        /// The checkpoint id it produced.
        checkpoint_id: String,
    },
    /// A job exhausted its retry budget.
    Failed {
        /// The job's id.
        job_id: String,
    },
    /// A job was moved to `manual_intervention` and will not be retried
    /// automatically.
    DeadLettered {
        /// The job's id.
        job_id: String,
    },
}

type Listener = Box<dyn Fn(&JobEvent) + Send + Sync>;

/// A registry of event listeners, each invoked on every [`JobEvent`].
///
/// A listener that panics is caught and logged; it never interrupts the
/// runner or other listeners.
#[derive(Default)]
pub struct Listeners(Mutex<Vec<Listener>>);

impl Listeners {
    /// Register a new listener.
    pub fn subscribe(&self, listener: impl Fn(&JobEvent) + Send + Sync + 'static) {
        self.0.lock().unwrap().push(Box::new(listener));
    }

    /// Dispatch `event` to every registered listener, isolating panics.
    pub fn emit(&self, event: JobEvent) {
        let listeners = self.0.lock().unwrap();
        for listener in listeners.iter() {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if outcome.is_err() {
                tracing::error!("checkpoint runner listener panicked; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_to_every_listener() {
        let listeners = Listeners::default();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        listeners.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        listeners.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(JobEvent::Enqueued { job_id: "job-1".into() });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_panicking_listener_does_not_block_the_rest() {
        let listeners = Listeners::default();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        listeners.subscribe(|_| panic!("boom"));
        listeners.subscribe(move |_| {
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(JobEvent::Failed { job_id: "job-1".into() });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
