//! # Motor Output Binary
//!
//! Runs the output subsystem against a timer backend with a synthetic
//! throttle ramp, for bench testing of protocol timing and binding.
//!
//! # Usage
//!
//! ```bash
//! # Bind and run 1000 cycles disarmed (outputs stay at zero)
//! motor_output --config config/quad_oneshot.toml
//!
//! # Drive the ramp until Ctrl-C
//! motor_output --config config/quad_oneshot.toml --arm --cycles 0
//!
//! # Verbose JSON logs
//! motor_output --config config/quad_oneshot.toml -v --json
//! ```

use clap::Parser;
use motor_common::consts::{DEFAULT_CONFIG_PATH, PULSE_MAX, PULSE_MIN};
use motor_common::prelude::*;
use motor_output::{BackendRegistry, MotorOutput};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Motor Output - motor/servo pulse generation bench
#[derive(Parser, Debug)]
#[command(name = "motor_output")]
#[command(version)]
#[command(about = "Motor and servo pulse output with pluggable timer backends")]
#[command(long_about = None)]
struct Args {
    /// Path to output configuration file (output.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the timer backend from the configuration
    #[arg(short, long)]
    backend: Option<String>,

    /// Number of control cycles to run (0 = until Ctrl-C)
    #[arg(long, default_value_t = 1000)]
    cycles: u64,

    /// Keep the outputs armed and drive the throttle ramp
    #[arg(long)]
    arm: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Timing statistics for control loop monitoring.
#[derive(Debug, Default)]
struct TimingStats {
    /// Number of cycles executed
    cycle_count: u64,
    /// Number of timing violations (cycle exceeded target)
    timing_violations: u64,
    /// Maximum observed cycle time
    max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    total_cycle_time_us: u64,
}

impl TimingStats {
    fn record(&mut self, elapsed: Duration, target: Duration) {
        let us = elapsed.as_micros() as u64;
        self.cycle_count += 1;
        self.total_cycle_time_us += us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(us);
        if elapsed > target {
            self.timing_violations += 1;
        }
    }

    fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Motor output failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = OutputConfig::load(&args.config);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    let config = config?;
    config.validate()?;
    info!(
        "Motor output v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let backend_name = args.backend.as_deref().unwrap_or(&config.backend);
    let registry = BackendRegistry::with_builtin();
    let mut backend = registry.create_backend(backend_name).inspect_err(|_| {
        let known: Vec<_> = registry.backend_names().collect();
        error!("Unknown timer backend '{}', available: {}", backend_name, known.join(", "));
    })?;

    let mut output = MotorOutput::init(&config, backend.as_mut());
    if !output.are_enabled() {
        warn!("Motor outputs unusable, running servos and beeper only");
    }

    if config.motor.protocol.is_digital() && output.are_enabled() {
        for slot in 0..output.motors().len() {
            if let Err(e) = output.send_command(slot, DshotCommand::Beep1.into()) {
                warn!("Motor {} beep failed: {}", slot, e);
            }
        }
    }

    if !args.arm {
        output.disable();
        info!("Outputs disarmed, pass --arm to drive the throttle ramp");
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let disarm = output.disarm_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        disarm.disable();
        flag.store(false, Ordering::SeqCst);
    })?;

    let stats = run_loop(&mut output, &args, &running);
    output.disable();

    info!(
        "Stopped after {} cycles: avg {} us, max {} us, {} overrun(s)",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.timing_violations
    );
    Ok(())
}

/// Drive a throttle ramp at the default loop rate.
fn run_loop(output: &mut MotorOutput, args: &Args, running: &AtomicBool) -> TimingStats {
    let mut stats = TimingStats::default();
    let motor_count = output.motors().len();
    let servo_count = output.servos().len();
    let digital = output.selection().protocol.is_digital();
    let span = u64::from(PULSE_MAX - PULSE_MIN);

    while running.load(Ordering::SeqCst) && (args.cycles == 0 || stats.cycle_count < args.cycles) {
        let start = Instant::now();

        let step = (stats.cycle_count % (2 * span)) as u16;
        let ramp = if u64::from(step) < span { step } else { (2 * span) as u16 - step };
        let value = if digital {
            // Skip the command range.
            48 + ramp
        } else {
            PULSE_MIN + ramp
        };

        for slot in 0..motor_count {
            output.write(slot, value);
        }
        output.complete_update(motor_count);

        for slot in 0..servo_count {
            output.write_servo(slot, PULSE_MIN + ramp);
        }
        if stats.cycle_count % 500 == 0 {
            output.toggle_beeper();
        }

        let elapsed = start.elapsed();
        stats.record(elapsed, DEFAULT_LOOP_TIME);
        if let Some(remaining) = DEFAULT_LOOP_TIME.checked_sub(elapsed) {
            thread::sleep(remaining);
        }
    }

    stats
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
