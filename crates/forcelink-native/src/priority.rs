//! Best-effort real-time scheduling for the control thread.
//!
//! Raising priority usually needs elevated privileges. Failure is reported
//! and otherwise ignored; the loop runs at normal priority.

use tracing::{debug, warn};

/// Priority requested under `CONTROL_POLICY`.
pub const CONTROL_PRIORITY: i32 = 10;

/// Scheduling policy for the control thread.
#[cfg(unix)]
pub const CONTROL_POLICY: libc::c_int = libc::SCHED_RR;

/// Outcome of a priority request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriorityOutcome {
    /// Thread now runs under a real-time policy
    Elevated,
    /// Request refused; value is the OS error code
    Denied(i32),
    /// Platform has no supported mechanism
    Unsupported,
}

/// Try to move the calling thread to `SCHED_RR` at `priority`.
#[cfg(unix)]
pub fn raise_current_thread(priority: i32) -> PriorityOutcome {
    // SAFETY: sched_param is plain data; zeroed is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;

    // SAFETY: pthread_self() is always a valid handle for the calling thread
    // and `param` outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), CONTROL_POLICY, &param) };

    if rc == 0 {
        debug!(priority, "Control thread running under SCHED_RR");
        PriorityOutcome::Elevated
    } else {
        warn!(
            priority,
            error = %std::io::Error::from_raw_os_error(rc),
            "Could not raise control thread priority, continuing at normal priority"
        );
        PriorityOutcome::Denied(rc)
    }
}

/// Try to raise the calling thread's priority.
#[cfg(not(unix))]
pub fn raise_current_thread(priority: i32) -> PriorityOutcome {
    debug!(priority, "Thread priority elevation not supported on this platform");
    PriorityOutcome::Unsupported
}
