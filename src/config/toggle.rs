//! Runtime enable/disable switch.

use std::sync::Arc;

use parking_lot::RwLock;

/// Shared on/off switch for PROXY header handling.
///
/// Cloning yields another handle to the same flag. Connections sample it once
/// when they are accepted; flipping it never affects a header that is already
/// being parsed.
#[derive(Debug, Clone, Default)]
pub struct FeatureToggle {
    enabled: Arc<RwLock<bool>>,
}

impl FeatureToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(RwLock::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.read()
    }

    /// Set the flag, returning the previous value.
    pub fn set(&self, enabled: bool) -> bool {
        std::mem::replace(&mut *self.enabled.write(), enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let toggle = FeatureToggle::new(false);
        let other = toggle.clone();

        assert!(!other.set(true));
        assert!(toggle.is_enabled());
        assert!(toggle.set(false));
        assert!(!other.is_enabled());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let toggle = FeatureToggle::new(false);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let toggle = toggle.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i == 0 {
                            toggle.set(!toggle.is_enabled());
                        } else {
                            let _ = toggle.is_enabled();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 1000 flips from false
        assert!(!toggle.is_enabled());
    }
}
