//! Injected credential-selection capability.
//!
//! First-run key selection belongs to the embedding environment, which may
//! pop a picker UI or walk the user through provisioning. The engine only
//! asks two things of it: whether a usable key exists, and to run the
//! selection flow when one does not.

/// Environment hook for credential availability. Implement for the host
/// application; the default [`NoopKeyGate`] assumes a key is configured.
pub trait KeyGate: Send + Sync {
    /// Whether a usable credential is already configured.
    fn has_key(&self) -> bool;

    /// Ask the environment to run its key-selection flow. May be a no-op.
    fn open_key_picker(&self);
}

/// Default gate: reports a key as present and has no picker.
#[derive(Debug, Default)]
pub struct NoopKeyGate;

impl KeyGate for NoopKeyGate {
    fn has_key(&self) -> bool {
        true
    }

    fn open_key_picker(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct PickerSpy {
        opened: AtomicBool,
    }

    impl KeyGate for PickerSpy {
        fn has_key(&self) -> bool {
            false
        }

        fn open_key_picker(&self) {
            self.opened.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_gate_reports_key_present() {
        let gate = NoopKeyGate;
        assert!(gate.has_key());
        gate.open_key_picker();
    }

    #[test]
    fn custom_gate_is_consulted() {
        let gate = PickerSpy {
            opened: AtomicBool::new(false),
        };
        assert!(!gate.has_key());
        gate.open_key_picker();
        assert!(gate.opened.load(Ordering::SeqCst));
    }
}
