//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Structured logging adapters and sinks."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __fl_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            scenario = ctx.scenario.unwrap_or(""),
            command = ctx.command.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            category = ctx.category.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with faultline context.
#[macro_export]
macro_rules! fl_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with faultline context.
#[macro_export]
macro_rules! fl_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with faultline context.
#[macro_export]
macro_rules! fl_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with faultline context.
#[macro_export]
macro_rules! fl_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fl_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
