//! Verifies the single-instance guarantee: a second lock attempt on the
//! same state directory is rejected while the first is held.

use std::sync::Mutex;

use prismisd::error::PrismisError;
use prismisd::locking::DaemonLock;

static ENV_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn second_acquire_fails_while_first_is_held() {
    let _guard = ENV_GUARD.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    unsafe { std::env::set_var("XDG_STATE_HOME", dir.path()) };

    let first = DaemonLock::acquire().expect("first lock should succeed");
    let second = DaemonLock::acquire();
    assert!(matches!(second, Err(PrismisError::LockHeld)));

    drop(first);
    unsafe { std::env::remove_var("XDG_STATE_HOME") };
}
