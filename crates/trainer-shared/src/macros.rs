/// Logs the message with its source location and returns it for display
#[macro_export]
macro_rules! internal_error {
    ($arg: expr) => {{
        let internal_error_msg = format!(
            "{}\ninternal error: {}:{}:{}",
            $arg,
            file!(),
            line!(),
            column!()
        );
        tracing::error!(?internal_error_msg);
        internal_error_msg
    }};
}

/// Use this version if we know that under normal operation this can happen but
/// we wish to monitor it
#[macro_export]
macro_rules! log_err_as_warn {
    ($arg: expr) => {
        if let Err(mishap) = $arg {
            tracing::warn!(?mishap);
        }
    };
}
