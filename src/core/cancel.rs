//! Cooperative cancellation, checked by the sequencer between steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL_HANDLER: Once = Once::new();

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    watch_interrupts: bool,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips on SIGINT. A second SIGINT exits immediately.
    pub fn on_interrupt() -> Self {
        INSTALL_HANDLER.call_once(install_sigint_handler);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_interrupts: true,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.watch_interrupts && INTERRUPTED.load(Ordering::SeqCst))
    }
}

#[cfg(unix)]
extern "C" fn handle_sigint(_signal: libc::c_int) {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // SAFETY: _exit is async-signal-safe.
        unsafe { libc::_exit(130) };
    }
}

#[cfg(unix)]
fn install_sigint_handler() {
    let handler: extern "C" fn(libc::c_int) = handle_sigint;
    // SAFETY: the handler only touches an atomic and calls _exit.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn plain_tokens_ignore_interrupt_flag() {
        let token = CancellationToken::new();
        assert!(!token.watch_interrupts);
        assert!(!token.is_cancelled());
    }
}
