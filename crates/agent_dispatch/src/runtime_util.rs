use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_millis_to_i64_saturating)
        .unwrap_or(0)
}

pub(crate) fn duration_millis_to_i64_saturating(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_millis_to_i64_saturating_clamps_on_overflow() {
        assert_eq!(
            duration_millis_to_i64_saturating(Duration::from_secs(u64::MAX)),
            i64::MAX
        );
    }

    #[test]
    fn lock_state_recovers_poisoned_mutex() {
        let state = std::sync::Arc::new(Mutex::new(7u32));
        let poisoner = std::sync::Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().expect("lock");
            panic!("poison the lock");
        })
        .join();
        assert!(state.is_poisoned());
        assert_eq!(*lock_state(&state), 7);
    }
}
