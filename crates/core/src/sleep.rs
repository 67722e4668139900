use rand::Rng;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Every fixed wait in the core goes through a pacer, so a run's pauses can be
/// observed without sleeping.
pub trait Pacer: Send {
    fn pause(&self, duration: Duration);

    fn pause_secs(&self, secs: f64) {
        self.pause(Duration::from_secs_f64(secs.max(0.0)));
    }
}

/// Real-time pacer. `jitter` is a fraction: 0.3 means +/-30%.
pub struct ThreadPacer {
    pub jitter: f64,
}

impl ThreadPacer {
    pub fn exact() -> Self {
        Self { jitter: 0.0 }
    }

    pub fn jittered(jitter: f64) -> Self {
        Self { jitter: jitter.clamp(0.0, 0.9) }
    }
}

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if self.jitter > 0.0 {
            sleep_jitter(duration.as_secs_f64(), self.jitter);
        } else {
            thread::sleep(duration);
        }
    }
}

/// Records pauses instead of sleeping. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingPacer {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    /// Number of recorded pauses of exactly `secs` seconds.
    pub fn count_secs(&self, secs: f64) -> usize {
        let want = Duration::from_secs_f64(secs);
        self.pauses.lock().unwrap().iter().filter(|&&d| d == want).count()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Sleep for `secs` seconds with +/-`fraction` random jitter.
pub fn sleep_jitter(secs: f64, fraction: f64) {
    let jitter = secs * fraction;
    let actual = if jitter > 0.0 {
        secs + rand::thread_rng().gen_range(-jitter..jitter)
    } else {
        secs
    };
    thread::sleep(Duration::from_secs_f64(actual.max(0.01)));
}

/// Sleep for exact milliseconds (no jitter).
pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
