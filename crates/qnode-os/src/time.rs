use chrono::Utc;

use qnode::platform::TimeSync;

/// A [`TimeSync`] reading the system clock, which the operating system
/// keeps synchronized.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSync {
    running: bool,
}

impl SystemTimeSync {
    /// Creates a [`SystemTimeSync`].
    #[must_use]
    pub const fn new() -> Self {
        Self { running: false }
    }
}

impl TimeSync for SystemTimeSync {
    fn begin(&mut self) {
        self.running = true;
    }

    fn now_epoch(&mut self) -> Option<i64> {
        self.running.then(|| Utc::now().timestamp())
    }

    fn end(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use qnode::platform::TimeSync;

    use super::SystemTimeSync;

    #[test]
    fn epoch_only_while_running() {
        let mut time = SystemTimeSync::new();
        assert_eq!(time.now_epoch(), None);

        time.begin();
        // 2020-01-01T00:00:00Z
        assert!(time.now_epoch().is_some_and(|epoch| epoch > 1_577_836_800));

        time.end();
        assert_eq!(time.now_epoch(), None);
    }
}
