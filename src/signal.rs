//! Bridges SIGINT/SIGTERM to the accept loop's stop flag.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_interrupt(_sig: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs the interrupt handlers and returns the flag they set.
///
/// SIGPIPE is ignored so a client hanging up mid-transfer surfaces as a
/// write error instead of killing the process.
pub fn install() -> io::Result<&'static AtomicBool> {
    let handler = handle_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;

    for sig in [libc::SIGINT, libc::SIGTERM] {
        if unsafe { libc::signal(sig, handler) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    if unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }

    Ok(&STOP_REQUESTED)
}
