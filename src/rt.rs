//! Best-effort real-time posture and cooperative shutdown.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use thiserror::Error;

const STACK_PREFAULT_BYTES: usize = 8 * 1024;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("sched_setscheduler(SCHED_FIFO, {priority}): {source}")]
    Scheduler { priority: i32, source: io::Error },

    #[error("mlockall: {0}")]
    LockMemory(io::Error),
}

/// Switch to SCHED_FIFO at `priority`, lock current and future pages, and
/// touch a stack region so it is resident before the loop starts.
pub fn go_realtime(priority: i32) -> Result<(), RealtimeError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(RealtimeError::Scheduler {
            priority,
            source: io::Error::last_os_error(),
        });
    }

    if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } != 0 {
        return Err(RealtimeError::LockMemory(io::Error::last_os_error()));
    }

    prefault_stack();
    Ok(())
}

#[inline(never)]
fn prefault_stack() {
    let mut dummy = [0u8; STACK_PREFAULT_BYTES];
    std::hint::black_box(&mut dummy);
}

extern "C" fn on_signal(signal: libc::c_int) {
    // Only async-signal-safe work here: record and raise the flag
    LAST_SIGNAL.store(signal, Ordering::Relaxed);
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the shutdown flag.
pub fn install_shutdown_handler() -> io::Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        if unsafe { libc::signal(signal, handler) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}

/// Signal number that raised the shutdown flag, if any.
pub fn received_signal() -> Option<i32> {
    match LAST_SIGNAL.load(Ordering::Relaxed) {
        0 => None,
        signal => Some(signal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_raises_flag_and_records_number() {
        on_signal(libc::SIGTERM);
        assert!(shutdown_flag().load(Ordering::SeqCst));
        assert_eq!(received_signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn scheduler_errors_carry_the_priority() {
        let err = RealtimeError::Scheduler {
            priority: 40,
            source: io::Error::from_raw_os_error(libc::EPERM),
        };
        assert!(err.to_string().starts_with("sched_setscheduler(SCHED_FIFO, 40)"));
    }
}
