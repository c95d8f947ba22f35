use std::sync::{Mutex, MutexGuard, OnceLock};

/// Serialises tests that change process-wide environment variables such as `HOME`.
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Acquires the environment lock, recovering it if a previous holder panicked.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
