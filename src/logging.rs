//! # LOGGING
//!
//! Installs one global [log] sink at startup: `env_logger` to stderr in
//! debug mode, or a small syslog adapter under facility `USER` with
//! identity `PCE` otherwise. Every other module only ever calls the `log`
//! macros; nothing below this module knows which sink is live.

use std::ffi::CString;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

static SYSLOG_OPEN: Once = Once::new();

/// Initializes logging for the process. `debug` selects the stderr sink
/// at `Debug` threshold (mirroring the reference's `LOG_PERROR` +
/// `LOG_DEBUG` combination); otherwise the syslog sink is installed at
/// `Warning` threshold, matching the reference's default.
pub fn init(debug: bool) {
    if debug {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        let logger = Box::new(SyslogLogger);
        log::set_boxed_logger(logger).expect("logger already initialized");
        log::set_max_level(LevelFilter::Warn);
    }
}

struct SyslogLogger;

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        SYSLOG_OPEN.call_once(|| {
            let ident = CString::new("PCE").unwrap();
            // `ident` is leaked deliberately: openlog keeps a pointer to
            // it for the lifetime of the process, same as the reference.
            unsafe {
                libc::openlog(Box::leak(ident.into_boxed_c_str()).as_ptr(), libc::LOG_PID, libc::LOG_USER);
            }
        });

        let priority = match record.level() {
            Level::Error => libc::LOG_ERR,
            Level::Warn => libc::LOG_WARNING,
            Level::Info => libc::LOG_INFO,
            Level::Debug | Level::Trace => libc::LOG_DEBUG,
        };
        if let Ok(message) = CString::new(format!("{}", record.args())) {
            unsafe {
                libc::syslog(priority, b"%s\0".as_ptr() as *const libc::c_char, message.as_ptr());
            }
        }
    }

    fn flush(&self) {}
}

impl Drop for SyslogLogger {
    fn drop(&mut self) {
        unsafe { libc::closelog() };
    }
}
