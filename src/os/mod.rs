//! Platform-specific module for terminal and signal handling.

use crate::report::DEFAULT_COLUMNS;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

/// Flag raised by the interrupt handler
static INTERRUPTED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Shared interrupt flag, set once the user presses Ctrl-C
pub fn interrupt_flag() -> Arc<AtomicBool> {
    Arc::clone(INTERRUPTED.get_or_init(|| Arc::new(AtomicBool::new(false))))
}

/// Width of the attached terminal, or the default when there is none
pub fn terminal_columns() -> usize {
    match crossterm::terminal::size() {
        Ok((columns, _)) if columns > 0 => usize::from(columns),
        _ => DEFAULT_COLUMNS,
    }
}

/// Whether log lines on stderr may carry color escapes
pub fn stderr_ansi() -> bool {
    use std::io::IsTerminal;
    ansi_for(std::io::stderr().is_terminal(), std::env::var_os("NO_COLOR").is_some())
}

fn ansi_for(is_terminal: bool, no_color: bool) -> bool {
    is_terminal && !no_color
}

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: nix::libc::c_int) {
    if let Some(flag) = INTERRUPTED.get() {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Route SIGINT to the interrupt flag.
///
/// The handler resets itself, so a second Ctrl-C terminates immediately.
#[cfg(unix)]
pub fn install_interrupt_handler() -> std::io::Result<Arc<AtomicBool>> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let flag = interrupt_flag();
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESETHAND | SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store on an initialized static.
    unsafe { sigaction(Signal::SIGINT, &action) }.map_err(std::io::Error::from)?;
    Ok(flag)
}

/// Route Ctrl-C to the interrupt flag (default handling on this platform).
#[cfg(not(unix))]
pub fn install_interrupt_handler() -> std::io::Result<Arc<AtomicBool>> {
    Ok(interrupt_flag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_flag_is_shared() {
        let a = interrupt_flag();
        let b = interrupt_flag();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_no_color_escapes_when_redirected() {
        assert!(ansi_for(true, false));
        assert!(!ansi_for(false, false));
        assert!(!ansi_for(true, true));
    }

    #[test]
    fn test_terminal_columns_positive() {
        assert!(terminal_columns() > 0);
    }
}
