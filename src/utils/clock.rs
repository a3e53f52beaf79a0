use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use tokio::time::Instant;

/// Represents an entity responsible for providing time across the application. Tracking loops only
/// talk to time through this trait, so tests can swap in a fixed calendar and tokio's paused clock.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Wall clock time in the user's timezone. Usage is bucketed by local calendar days.
    fn time(&self) -> DateTime<Local>;

    /// Monotonic time used for measuring intervals between flushes.
    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);

    fn today(&self) -> NaiveDate {
        self.time().date_naive()
    }
}

#[derive(Clone, Copy)]
pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

#[cfg(test)]
pub mod test_clock {
    use async_trait::async_trait;
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use tokio::time::Instant;

    use super::Clock;

    /// Clock that starts at a fixed local time and moves forward together with tokio's (possibly
    /// paused) clock.
    #[derive(Clone)]
    pub struct TestClock {
        start_time: DateTime<Local>,
        reference: Instant,
    }

    impl TestClock {
        pub fn starting_at(start: NaiveDateTime) -> Self {
            Self {
                start_time: Local
                    .from_local_datetime(&start)
                    .earliest()
                    .expect("Test dates should exist in the local timezone"),
                reference: Instant::now(),
            }
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }
}
