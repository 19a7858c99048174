//! Human-readable error descriptions and structured JSON error formatting.

use aqua_core::error::{AquaError, BuildError, ValidationError};

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_REJECTED: i32 = 2;
pub const EXIT_VALIDATION: i32 = 3;
pub const EXIT_TRANSPORT: i32 = 4;

fn validation_text(v: &ValidationError) -> String {
    format!(
        "What happened: Input rejected before sending ({v}).\nLikely causes: A value outside what the controller accepts.\nHow to fix: Correct the value and rerun; nothing was sent to the device."
    )
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(v) = err.downcast_ref::<ValidationError>() {
        return validation_text(v);
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No connection to a controller was configured.\nLikely causes: Neither --base-url, --sim nor a config file with [device] was given.\nHow to fix: Pass --base-url http://<controller> or point --config at a file.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/aqua_config.toml for a sample."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AquaError>() {
        return match ae {
            AquaError::Device(msg) => format!(
                "What happened: The controller refused the request: {msg}.\nLikely causes: The command does not fit the device's current state or configuration.\nHow to fix: Check `aqua status`, adjust, then retry."
            ),
            AquaError::Timeout => "What happened: The controller did not answer in time.\nLikely causes: Weak wireless signal or the device is busy rebooting.\nHow to fix: Retry, or raise timeouts.request_ms in the config.".to_string(),
            AquaError::Transport(msg) => format!(
                "What happened: Could not reach the controller ({msg}).\nLikely causes: Wrong base URL, device powered off, or it is in network-setup mode on its own access point.\nHow to fix: Check device.base_url / --base-url and that this machine is on the same network."
            ),
            AquaError::Validation(v) => validation_text(v),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'target,measured_ml'.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: {msg}.\nLikely causes: The config file does not exist at that path.\nHow to fix: Pass --config FILE, or --base-url URL to run without one."
        );
    }

    if lower.contains("must ") && (lower.contains("device.") || lower.contains("timeouts.") || lower.contains("sync.") || lower.contains("scan.") || lower.contains("display.") || lower.contains("logging.")) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range value in the TOML.\nHow to fix: Edit the named key and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ValidationError>().is_some() {
        return EXIT_VALIDATION;
    }
    match err.downcast_ref::<AquaError>() {
        Some(AquaError::Device(_)) => EXIT_REJECTED,
        Some(AquaError::Validation(_)) => EXIT_VALIDATION,
        Some(AquaError::Transport(_) | AquaError::Timeout) => EXIT_TRANSPORT,
        _ => EXIT_GENERIC,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<ValidationError>().is_some() {
        return "Validation";
    }
    match err.downcast_ref::<AquaError>() {
        Some(AquaError::Device(_)) => "Rejected",
        Some(AquaError::Validation(_)) => "Validation",
        Some(AquaError::Transport(_)) => "Transport",
        Some(AquaError::Timeout) => "Timeout",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(AquaError::Device(msg)) = err.downcast_ref::<AquaError>() {
        obj["device_error"] = json!(msg);
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_rejection_maps_to_exit_2() {
        let err = eyre::Report::new(AquaError::Device("invalid channel".into()));
        assert_eq!(exit_code_for_error(&err), EXIT_REJECTED);
        assert!(humanize(&err).contains("invalid channel"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Rejected");
        assert_eq!(v["device_error"], "invalid channel");
    }

    #[test]
    fn validation_and_transport_codes() {
        let err = eyre::Report::new(ValidationError::Empty { field: "name" });
        assert_eq!(exit_code_for_error(&err), EXIT_VALIDATION);
        let err = eyre::Report::new(AquaError::Timeout);
        assert_eq!(exit_code_for_error(&err), EXIT_TRANSPORT);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), EXIT_GENERIC);
    }
}
