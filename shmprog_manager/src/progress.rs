//! Progress output for the shmprog CLI
//!
//! Builds the terminal renderer for the coordinator's display loop and
//! prints the closing status lines.

use console::style;
use shmprog_core::{DisplayConfig, IndicatifRenderer, ProgressResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global quiet mode flag
static QUIET_MODE: AtomicBool = AtomicBool::new(false);

pub const MARK_SUCCESS: &str = "[ok]";
pub const MARK_ERROR: &str = "[xx]";

/// Set global quiet mode
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::SeqCst);
}

/// Check if quiet mode is enabled
pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::SeqCst)
}

/// Renderer for the display loop; hidden in quiet mode
pub fn progress_renderer(config: &DisplayConfig) -> ProgressResult<IndicatifRenderer> {
    let mut config = config.clone();
    config.hidden |= is_quiet();
    IndicatifRenderer::new(&config)
}

/// Format a status line with a leading mark
pub fn success_line(message: &str) -> String {
    format!("{} {}", MARK_SUCCESS, style(message).green())
}

pub fn error_line(message: &str) -> String {
    format!("{} {}", MARK_ERROR, style(message).red())
}

pub fn finish_success(message: &str) {
    if !is_quiet() {
        eprintln!("{}", success_line(message));
    }
}

/// Errors are printed even in quiet mode
pub fn finish_error(message: &str) {
    eprintln!("{}", error_line(message));
}
