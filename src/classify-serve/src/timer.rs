use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Wall-clock timer for one stage of an invocation.
pub struct Timer {
    name: String,
    tstamp: Option<DateTime<Utc>>,
    duration: Option<Duration>,
}

impl Timer {
    /// Create a new, stopped timer
    pub fn new(name: &str) -> Self {
        Timer {
            name: name.to_owned(),
            tstamp: None,
            duration: None,
        }
    }

    pub fn new_start(name: &str) -> Self {
        let mut t = Timer::new(name);
        t.start();
        t
    }

    /// Start the timer, discarding any previous measurement
    pub fn start(&mut self) {
        info!("{}: starting", self.name);

        self.tstamp = Some(Utc::now());
        self.duration = None;
    }

    /// Stop the timer and return the last measured duration in milliseconds
    pub fn stop(&mut self) -> i64 {
        if let Some(tstamp) = self.tstamp.take() {
            let d = Utc::now() - tstamp;
            self.duration = Some(d);
            info!("{} duration: {} msec", self.name, d.num_milliseconds());
        } else {
            debug!("{}: not running!", self.name);
        }

        self.millis()
    }

    /// Duration of the last completed run in milliseconds, 0 if none
    pub fn millis(&self) -> i64 {
        self.duration.map_or(0, |d| d.num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_timer_reports_zero() {
        let mut t = Timer::new("idle");
        assert_eq!(t.stop(), 0);
        assert_eq!(t.millis(), 0);
    }

    #[test]
    fn stopped_timer_keeps_duration_until_restart() {
        let mut t = Timer::new_start("sleep");
        std::thread::sleep(std::time::Duration::from_millis(15));
        let ms = t.stop();
        assert!(ms >= 10);
        assert_eq!(t.millis(), ms);

        // A second stop without a start keeps the last measurement.
        assert_eq!(t.stop(), ms);

        t.start();
        assert_eq!(t.millis(), 0);
    }
}
