mod cli;
mod error_fmt;
mod logging;
mod ops;
mod render;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use aqua_http::{HttpOptions, HttpTransport};
use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

/// Base URL recorded for `--sim` runs without a config file.
const SIM_BASE_URL: &str = "http://simulated.invalid";

fn main() {
    let _ = color_eyre::install();
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    if let Err(err) = run(&args) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn load_config(args: &Cli) -> eyre::Result<aqua_config::Config> {
    let override_url = args
        .base_url
        .clone()
        .or_else(|| args.sim.then(|| SIM_BASE_URL.to_string()));

    let text = match fs::read_to_string(&args.config) {
        Ok(t) => t,
        // A URL on the command line is enough to run without a file.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && override_url.is_some() => {
            let url = toml::Value::String(override_url.clone().unwrap_or_default());
            format!("[device]\nbase_url = {url}\n")
        }
        Err(e) => eyre::bail!("read config {}: {e}", args.config.display()),
    };

    let mut cfg = aqua_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", args.config.display()))?;
    if let Some(url) = args.base_url.clone() {
        cfg.device.base_url = url;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(args: &Cli) -> eyre::Result<()> {
    let cfg = load_config(args)?;
    logging::init_tracing(args.json, &args.log_level, &cfg.logging)?;

    if args.sim {
        tracing::info!("using simulated controller");
        let device = Arc::new(ops::sim_device());
        return ops::execute(&args.cmd, device, &cfg, args.json);
    }

    let opts = HttpOptions {
        connect_timeout: Duration::from_millis(cfg.timeouts.connect_ms),
        request_timeout: Duration::from_millis(cfg.timeouts.request_ms),
        stream_idle_timeout: Duration::from_millis(cfg.timeouts.stream_idle_ms),
    };
    tracing::info!(base_url = %cfg.device.base_url, "connecting");
    let transport = Arc::new(HttpTransport::new(&cfg.device.base_url, opts));
    ops::execute(&args.cmd, transport, &cfg, args.json)
}
