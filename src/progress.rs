use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar,ProgressStyle};

/// Terminal progress for round based algorithms.  When disabled every call is a no-op, so
/// library callers and tests stay quiet.
pub struct CLProgressBar {
    pb: Option<ProgressBar>,
    message: Mutex<String>
}

impl CLProgressBar {
    pub fn new(rounds: u64, enabled: bool) -> Self {
        let pb = if enabled {
            let pb = ProgressBar::new(rounds);
            let template = "[{msg}] {wide_bar} {pos:>5}/{len:5} rounds - Elapsed: {elapsed_precise}, Remaining: {eta_precise}";
            let style = ProgressStyle::default_bar()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar());

            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(200));
            Some(pb)
        } else {
            None
        };

        CLProgressBar {
            pb,
            message: Mutex::new(String::new())
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pb.is_some()
    }

    pub fn update_message<F>(&self, update_message: F)
    where
        F: Fn(&mut String) -> ()
    {
        // A poisoned message is still just a string
        let mut msg = match self.message.lock() {
            Ok(msg) => msg,
            Err(poisoned) => poisoned.into_inner()
        };

        update_message(&mut *msg);

        if let Some(pb) = &self.pb {
            pb.set_message((*msg).clone());
        }
    }

    pub fn inc(&self, amt: u64) {
        if let Some(pb) = &self.pb {
            pb.inc(amt);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish();
        }
    }
}

#[cfg(test)]
mod progress_tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_disabled() {
        let pb = CLProgressBar::new(10, false);
        assert!(!pb.is_enabled());
        pb.update_message(|msg| {
            msg.clear();
            write!(msg, "Round {}", 3).expect("Should never fail!");
        });
        pb.inc(1);
        pb.finish();
        assert_eq!(*pb.message.lock().unwrap(), "Round 3");
    }
}
