//! Output subsystem integration tests.
//!
//! Every test binds a board described in TOML on the simulation backend and
//! checks the simulated registers through the probe.

use motor_common::config::ConfigLoader;
use motor_common::output::channel::{OutputError, Polarity};
use motor_common::output::config::OutputConfig;
use motor_common::output::types::{IoTag, MotorProtocol, TimerId};
use motor_output::drivers::simulation::{SimProbe, SimulationBackend};
use motor_output::port::ProtocolMeta;
use motor_output::{CommitMode, MotorOutput, PulseWriter};

/// Four motors: 1/2 on TIM1, 3/4 on TIM8. Servos on TIM4, beeper on TIM3.
const BOARD: &str = r#"
[[timers]]
tag = "PA8"
timer = 1
channel = 1
usage = ["motor"]

[[timers]]
tag = "PA9"
timer = 1
channel = 2
usage = ["motor"]

[[timers]]
tag = "PC6"
timer = 8
channel = 1
usage = ["motor"]

[[timers]]
tag = "PC7"
timer = 8
channel = 2
usage = ["motor"]

[[timers]]
tag = "PB6"
timer = 4
channel = 1
usage = ["servo"]

[[timers]]
tag = "PB7"
timer = 4
channel = 2
usage = ["servo"]

[[timers]]
tag = "PB4"
timer = 3
channel = 1
usage = ["beeper"]
"#;

const MOTOR_PINS: [&str; 4] = ["PA8", "PA9", "PC6", "PC7"];

fn tag(s: &str) -> IoTag {
    s.parse().unwrap()
}

fn config(sections: &str) -> OutputConfig {
    let config = OutputConfig::from_toml(&format!("{sections}\n{BOARD}")).expect("valid config");
    config.validate().expect("config validates");
    config
}

fn quad(protocol: &str, extra: &str) -> OutputConfig {
    config(&format!(
        r#"
[motor]
protocol = "{protocol}"
motor_count = 4
io_tags = ["PA8", "PA9", "PC6", "PC7"]
command_delay_us = 1
{extra}
"#
    ))
}

fn init(config: &OutputConfig) -> (MotorOutput, SimProbe, SimulationBackend) {
    let mut backend = SimulationBackend::new();
    let probe = backend.probe();
    let output = MotorOutput::init(config, &mut backend);
    (output, probe, backend)
}

fn compares(probe: &SimProbe) -> Vec<Option<u32>> {
    MOTOR_PINS.iter().map(|p| probe.compare(tag(p))).collect()
}

fn actives(probe: &SimProbe) -> Vec<Option<u32>> {
    MOTOR_PINS.iter().map(|p| probe.active(tag(p))).collect()
}

// ─── One-shot ───────────────────────────────────────────────────────

#[test]
fn test_oneshot_commit_emits_pulse_then_zeroes_compare() {
    let (mut output, probe, _backend) = init(&quad("oneshot125", ""));
    assert!(output.are_enabled());
    assert_eq!(output.selection().commit, CommitMode::OneShot);

    for (slot, value) in [1100, 1200, 1300, 1400].into_iter().enumerate() {
        output.write(slot, value);
    }
    // 8 MHz: value / 8 µs * 8 ticks = value ticks.
    assert_eq!(compares(&probe), [Some(1100), Some(1200), Some(1300), Some(1400)]);

    output.complete_update(4);

    assert_eq!(compares(&probe), [Some(0); 4]);
    assert_eq!(actives(&probe), [Some(1100), Some(1200), Some(1300), Some(1400)]);
}

#[test]
fn test_shared_timer_restarted_once_per_cycle() {
    let (mut output, probe, _backend) = init(&quad("oneshot42", ""));

    let flags: Vec<bool> = output.motors().iter().map(|p| p.force_overflow()).collect();
    assert_eq!(flags, [true, false, true, false]);

    for cycle in 1..=3 {
        for slot in 0..4 {
            output.write(slot, 1500);
        }
        output.complete_update(4);
        assert_eq!(probe.restarts(TimerId(1)), cycle);
        assert_eq!(probe.restarts(TimerId(8)), cycle);
    }
    assert_eq!(probe.period(TimerId(1)), Some(0xFFFF));
}

#[test]
fn test_oneshot_timer_clock_and_idle_pulse() {
    let (output, probe, _backend) = init(&quad("multishot", "idle_pulse = 360"));
    assert_eq!(output.selection().timer_mhz, 72);
    assert_eq!(probe.mhz(TimerId(1)), Some(72));
    // Idle pulse loaded at configure time, compare cleared right after.
    assert_eq!(actives(&probe), [Some(360); 4]);
    assert_eq!(compares(&probe), [Some(0); 4]);
    assert!(MOTOR_PINS.iter().all(|p| probe.configure_count(tag(p)) == 1));
}

#[test]
fn test_unsynced_oneshot_runs_free() {
    let (mut output, probe, _backend) = init(&quad(
        "oneshot125",
        "use_unsynced_pwm = true\npwm_rate = 2000",
    ));
    assert_eq!(output.selection().commit, CommitMode::FreeRunning);
    assert_eq!(probe.period(TimerId(1)), Some(4000));

    output.write(0, 1500);
    output.complete_update(4);
    assert_eq!(probe.compare(tag("PA8")), Some(1500));
    assert_eq!(probe.restarts(TimerId(1)), 0);

    probe.advance_all(4000);
    assert_eq!(probe.active(tag("PA8")), Some(1500));
}

// ─── Free-running protocols ─────────────────────────────────────────

#[test]
fn test_standard_pwm_writes_microseconds() {
    let (mut output, probe, _backend) = init(&quad("standard", "idle_pulse = 1000"));
    let selection = output.selection();
    assert!(selection.unsynced);
    assert_eq!(selection.idle_pulse, 0);
    assert_eq!(probe.period(TimerId(1)), Some(2500));

    output.write(2, 1750);
    output.complete_update(4);
    assert_eq!(probe.compare(tag("PC6")), Some(1750));
    assert_eq!(probe.total_restarts(), 0);
}

#[test]
fn test_brushed_duty_cycle() {
    let (mut output, probe, _backend) = init(&quad("brushed", "pwm_rate = 16000"));
    assert_eq!(output.motors().get(0).map(|p| p.period()), Some(1500));

    output.write(0, 1000);
    output.write(1, 1500);
    output.write(2, 2000);
    assert_eq!(probe.compare(tag("PA8")), Some(0));
    assert_eq!(probe.compare(tag("PA9")), Some(750));
    assert_eq!(probe.compare(tag("PC6")), Some(1500));
}

#[test]
fn test_inversion_flips_polarity() {
    let (_output, probe, _backend) = init(&quad("oneshot125", "inversion = true"));
    let mode = probe.mode(tag("PA8")).expect("configured");
    assert_eq!(mode.polarity, Polarity::ActiveLow);
    assert!(mode.idle_high);
}

// ─── Arming gate ────────────────────────────────────────────────────

#[test]
fn test_disable_zeroes_and_gates_writes() {
    let (mut output, probe, _backend) = init(&quad("standard", ""));
    for slot in 0..4 {
        output.write(slot, 1600);
    }
    assert_eq!(compares(&probe), [Some(1600); 4]);

    output.disable();
    assert!(!output.are_enabled());
    assert_eq!(compares(&probe), [Some(0); 4]);

    output.write(0, 1800);
    output.complete_update(4);
    assert_eq!(compares(&probe), [Some(0); 4]);

    output.enable();
    assert!(output.are_enabled());
    output.write(0, 1800);
    output.complete_update(4);
    assert_eq!(probe.compare(tag("PA8")), Some(1800));
}

#[test]
fn test_oneshot_disable_after_commit() {
    let (mut output, probe, _backend) = init(&quad("oneshot125", ""));
    for slot in 0..4 {
        output.write(slot, 1500);
    }
    output.complete_update(4);
    assert_eq!(actives(&probe), [Some(1500); 4]);
    let restarts = probe.total_restarts();

    output.disable();
    assert_eq!(compares(&probe), [Some(0); 4]);
    probe.advance_all(0xFFFF);
    assert_eq!(actives(&probe), [Some(0); 4]);

    // Gated: no new pulse, no timer restart.
    output.write(0, 2000);
    output.complete_update(4);
    assert_eq!(compares(&probe), [Some(0); 4]);
    assert_eq!(probe.total_restarts(), restarts);
}

#[test]
fn test_disarm_handle_from_another_thread() {
    let (mut output, probe, _backend) = init(&quad("standard", ""));
    let handle = output.disarm_handle();
    assert_eq!(handle.channel_count(), 4);

    // Disarm while the loop keeps writing.
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let remote = handle.clone();
    let disarm = std::thread::spawn(move || {
        started_rx.recv().unwrap();
        remote.disable();
    });

    let mut cycles = 0u32;
    while output.are_enabled() {
        for slot in 0..4 {
            output.write(slot, 1600);
        }
        output.complete_update(4);
        cycles += 1;
        if cycles == 10 {
            started_tx.send(()).unwrap();
        }
        assert!(cycles < 10_000_000, "disarm never observed");
    }
    disarm.join().unwrap();
    assert!(!handle.is_enabled());

    output.write(0, 1800);
    assert_ne!(probe.compare(tag("PA8")), Some(1800));

    // Re-arm, then zero from another thread.
    output.enable();
    for slot in 0..4 {
        output.write(slot, 1700);
    }
    assert_eq!(compares(&probe), [Some(1700); 4]);
    let remote = handle.clone();
    std::thread::spawn(move || remote.disable()).join().unwrap();
    assert!(!output.are_enabled());
    assert_eq!(compares(&probe), [Some(0); 4]);
}

#[test]
fn test_disarm_handle_skips_dshot_ports() {
    let (output, _probe, _backend) = init(&quad("dshot600", ""));
    let handle = output.disarm_handle();
    assert_eq!(handle.channel_count(), 0);
    handle.disable();
    assert!(!output.are_enabled());
}

#[test]
fn test_disable_from_shared_reference() {
    let (mut output, probe, _backend) = init(&quad("standard", ""));
    output.write(3, 1900);

    let shared: &MotorOutput = &output;
    shared.disable();
    assert_eq!(probe.compare(tag("PC7")), Some(0));
}

#[test]
fn test_shutdown_pulses_first_count() {
    let (mut output, probe, _backend) = init(&quad("standard", ""));
    for slot in 0..4 {
        output.write(slot, 1500);
    }
    output.shutdown_pulses(2);
    assert_eq!(compares(&probe), [Some(0), Some(0), Some(1500), Some(1500)]);
    assert!(output.are_enabled());
}

// ─── Insufficient hardware ──────────────────────────────────────────

#[test]
fn test_more_motors_than_hardware_disables_outputs() {
    let config = config(
        r#"
[motor]
protocol = "oneshot125"
motor_count = 6
io_tags = ["PA8", "PA9", "PC6", "PC7", "PA10", "PA11"]
"#,
    );
    let (mut output, probe, _backend) = init(&config);

    assert!(!output.are_enabled());
    assert!(output.motors().is_empty());
    assert_eq!(output.selection().writer, PulseWriter::Disabled);
    assert_eq!(output.selection().commit, CommitMode::Disabled);

    output.write(0, 1500);
    output.complete_update(6);
    assert_eq!(probe.total_restarts(), 0);
    assert_eq!(probe.compare(tag("PA8")), Some(0));

    output.enable();
    assert!(!output.are_enabled());
}

#[test]
fn test_backend_fault_disables_outputs() {
    let config = quad("oneshot125", "");
    let mut backend = SimulationBackend::new().with_faulty_pin(tag("PC6"));
    let output = MotorOutput::init(&config, &mut backend);
    assert!(!output.are_enabled());
    assert_eq!(output.motor_count(), 4);
}

#[test]
fn test_motor_pin_cannot_be_claimed_by_servo() {
    let mut config = quad("standard", "");
    config.timers[0].usage = vec![motor_common::output::config::UsageKind::Any];
    config.servo = Some(motor_common::output::config::ServoDevConfig {
        io_tags: vec![tag("PA8"), tag("PB6")],
        ..Default::default()
    });
    let (output, _probe, _backend) = init(&config);
    assert!(output.are_enabled());
    assert!(output.servos().is_empty());
}

// ─── Checked writes ─────────────────────────────────────────────────

#[test]
fn test_try_write_rejects_out_of_range() {
    let (mut output, probe, _backend) = init(&quad("standard", ""));
    assert!(matches!(
        output.try_write(4, 1500),
        Err(OutputError::PreconditionViolation(_))
    ));
    assert!(matches!(
        output.try_write(0, 2500),
        Err(OutputError::PreconditionViolation(_))
    ));
    assert_eq!(probe.compare(tag("PA8")), Some(0));

    assert_eq!(output.try_write(0, 2000), Ok(()));
    assert_eq!(probe.compare(tag("PA8")), Some(2000));
}

// ─── DShot ──────────────────────────────────────────────────────────

#[test]
fn test_dshot_selection_and_configuration() {
    let (output, probe, backend) = init(&quad("dshot600", ""));
    assert!(output.are_enabled());
    assert_eq!(output.selection().writer, PulseWriter::Digital);
    assert_eq!(output.selection().timer_mhz, 12);

    let dshot = backend.dshot_probe();
    for slot in 0..4 {
        assert_eq!(dshot.configured(slot), Some(MotorProtocol::Dshot600));
    }
    // The encoder owns the hardware, no timer channel is opened.
    assert!(!probe.is_open(tag("PA8")));
}

#[test]
fn test_dshot_write_commit_sends_frames() {
    let (mut output, _probe, backend) = init(&quad("dshot300", ""));
    let dshot = backend.dshot_probe();

    for slot in 0..4 {
        output.write(slot, 1046);
    }
    assert!(dshot.frames().is_empty());
    output.complete_update(4);

    let frames = dshot.frames();
    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|f| f.bits == 0x82C6 && !f.telemetry));
    assert_eq!(dshot.commits(), 1);
}

#[test]
fn test_send_command_repeats() {
    let (mut output, _probe, backend) = init(&quad("dshot600", ""));
    let dshot = backend.dshot_probe();

    assert_eq!(output.send_command(0, 7), Ok(10));
    let frames = dshot.frames_for(0);
    assert_eq!(frames.len(), 10);
    assert!(frames.iter().all(|f| f.value == 7 && f.telemetry));

    assert_eq!(output.send_command(1, 1), Ok(1));
    assert_eq!(dshot.frames_for(1).len(), 1);

    assert_eq!(output.send_command(2, 48), Err(OutputError::InvalidCommand(48)));
    assert!(dshot.frames_for(2).is_empty());
    assert_eq!(dshot.commits(), 11);
}

#[test]
fn test_send_command_ignores_arming_gate() {
    let (mut output, _probe, backend) = init(&quad("dshot150", ""));
    output.disable();
    assert_eq!(output.send_command(3, 21), Ok(10));
    assert_eq!(backend.dshot_probe().frames_for(3).len(), 10);

    // Regular writes stay gated.
    output.write(3, 500);
    output.complete_update(4);
    assert_eq!(backend.dshot_probe().frames_for(3).len(), 10);
}

#[test]
fn test_send_command_requires_digital_protocol() {
    let (mut output, _probe, _backend) = init(&quad("oneshot125", ""));
    assert_eq!(output.send_command(0, 1), Err(OutputError::NotDigital));
}

#[test]
fn test_dshot_without_encoder_disables_outputs() {
    let config = quad("dshot1200", "");
    let mut backend = SimulationBackend::without_dshot();
    let mut output = MotorOutput::init(&config, &mut backend);
    assert!(!output.are_enabled());
    assert!(matches!(
        output.send_command(0, 1),
        Err(OutputError::PreconditionViolation(_))
    ));
}

// ─── Onboard ESC ────────────────────────────────────────────────────

/// One onboard-ESC motor: three shadowed phase channels on TIM1.
fn onboard_esc() -> OutputConfig {
    OutputConfig::from_toml(
        r#"
[motor]
protocol = "onboard_esc"
motor_count = 1
io_tags = ["PA8", "PA9", "PA10"]
pwm_rate = 16000
deadtime = 12

[[timers]]
tag = "PA8"
timer = 1
channel = 1
shadowed = true

[[timers]]
tag = "PA9"
timer = 1
channel = 2
shadowed = true

[[timers]]
tag = "PA10"
timer = 1
channel = 3
n_channel = true
shadowed = true
"#,
    )
    .expect("valid config")
}

#[test]
fn test_onboard_esc_shadow_transfer() {
    let config = onboard_esc();
    let (mut output, probe, _backend) = init(&config);
    assert!(output.are_enabled());
    assert_eq!(output.selection().commit, CommitMode::ShadowTransfer);

    let port = output.motors().get(0).expect("bound");
    assert_eq!(port.channels().len(), 3);
    assert!(matches!(port.meta(), ProtocolMeta::Inverter(state) if state.deadtime == 12));
    // 72 MHz center-aligned at 16 kHz.
    assert_eq!(probe.period(TimerId(1)), Some(2250));

    let phases = ["PA8", "PA9", "PA10"];
    output.write(0, 1500);
    assert!(phases.iter().all(|p| probe.compare(tag(p)) == Some(1125)));

    // A period boundary without a transfer request changes nothing.
    probe.advance(TimerId(1), 2250);
    assert!(phases.iter().all(|p| probe.active(tag(p)) == Some(0)));

    output.complete_update(1);
    probe.advance(TimerId(1), 2250);
    assert!(phases.iter().all(|p| probe.active(tag(p)) == Some(1125)));

    let low_side = probe.mode(tag("PA10")).expect("configured");
    assert!(low_side.complementary);
    assert_eq!(low_side.dead_time, 12);
}

#[test]
fn test_onboard_esc_disable_reaches_pins_at_next_period() {
    let (mut output, probe, _backend) = init(&onboard_esc());
    let phases = ["PA8", "PA9", "PA10"];

    output.write(0, 1500);
    output.complete_update(1);
    probe.advance(TimerId(1), 2250);
    assert!(phases.iter().all(|p| probe.active(tag(p)) == Some(1125)));

    output.disable();
    assert!(phases.iter().all(|p| probe.compare(tag(p)) == Some(0)));
    probe.advance(TimerId(1), 2250);
    assert!(phases.iter().all(|p| probe.active(tag(p)) == Some(0)));
}

// ─── Servos and beeper ──────────────────────────────────────────────

#[test]
fn test_servo_outputs() {
    let config = config(
        r#"
[motor]
protocol = "standard"
motor_count = 0

[servo]
io_tags = ["PB6", "PB7"]
pwm_rate = 50
center_pulse = 1500
"#,
    );
    let (output, probe, _backend) = init(&config);
    assert_eq!(output.servos().len(), 2);
    assert_eq!(probe.period(TimerId(4)), Some(20_000));
    assert_eq!(probe.active(tag("PB6")), Some(1500));
    assert_eq!(probe.compare(tag("PB6")), Some(0));

    output.write_servo(1, 1200);
    output.write_servo(7, 1200);
    assert_eq!(probe.compare(tag("PB7")), Some(1200));
}

#[test]
fn test_servo_binding_stops_at_gap() {
    let config = config(
        r#"
[motor]
motor_count = 0

[servo]
io_tags = ["PB6", "PB9", "PB7"]
"#,
    );
    let (output, probe, _backend) = init(&config);
    assert_eq!(output.servos().len(), 1);
    assert!(!probe.is_open(tag("PB7")));

    let config = config_with_servos(r#"["PB6", "", "PB7"]"#);
    let (output, _probe, _backend) = init(&config);
    assert_eq!(output.servos().len(), 1);
}

fn config_with_servos(tags: &str) -> OutputConfig {
    config(&format!(
        r#"
[motor]
motor_count = 0

[servo]
io_tags = {tags}
"#
    ))
}

#[test]
fn test_beeper_on_off_toggle() {
    let config = config(
        r#"
[motor]
motor_count = 0

[beeper]
io_tag = "PB4"
frequency = 2000
"#,
    );
    let (mut output, probe, _backend) = init(&config);
    let beep = tag("PB4");
    assert!(output.beeper().is_some());
    assert_eq!(probe.period(TimerId(3)), Some(500));
    assert_eq!(probe.compare(beep), Some(0));

    output.write_beeper(true);
    assert_eq!(probe.compare(beep), Some(250));
    output.toggle_beeper();
    assert_eq!(probe.compare(beep), Some(0));
    output.toggle_beeper();
    assert_eq!(probe.compare(beep), Some(250));
    assert!(output.beeper().is_some_and(|b| b.is_on()));
}

#[test]
fn test_missing_beeper_is_absent() {
    let config = config(
        r#"
[motor]
motor_count = 0

[beeper]
io_tag = "PC13"
frequency = 2000
"#,
    );
    let (mut output, _probe, _backend) = init(&config);
    assert!(output.beeper().is_none());
    output.write_beeper(true);
    output.toggle_beeper();
}

// ─── Shipped configurations ─────────────────────────────────────────

fn shipped(name: &str) -> OutputConfig {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("config")
        .join(name);
    let config = OutputConfig::load(&path).expect("shipped config loads");
    config.validate().expect("shipped config validates");
    config
}

#[test]
fn test_shipped_quad_oneshot_binds() {
    let config = shipped("quad_oneshot.toml");
    let registry = motor_output::BackendRegistry::with_builtin();
    let mut backend = registry.create_backend(&config.backend).expect("backend");

    let output = MotorOutput::init(&config, backend.as_mut());
    assert!(output.are_enabled());
    assert_eq!(output.motors().len(), 4);
    assert_eq!(output.servos().len(), 2);
    assert!(output.beeper().is_some());
}

#[test]
fn test_shipped_hexa_dshot_binds() {
    let config = shipped("hexa_dshot600.toml");
    let registry = motor_output::BackendRegistry::with_builtin();
    let mut backend = registry.create_backend(&config.backend).expect("backend");

    let output = MotorOutput::init(&config, backend.as_mut());
    assert!(output.are_enabled());
    assert_eq!(output.motors().len(), 6);
    assert_eq!(output.selection().writer, PulseWriter::Digital);
    assert_eq!(output.command_delay(), std::time::Duration::from_millis(1));
}

#[test]
fn test_unknown_backend_in_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("output.toml");
    std::fs::write(
        &path,
        "backend = \"fpga\"\n[motor]\nprotocol = \"standard\"\nmotor_count = 0\n",
    )
    .unwrap();

    let config = OutputConfig::load(&path).expect("load");
    let registry = motor_output::BackendRegistry::with_builtin();
    assert!(matches!(
        registry.create_backend(&config.backend),
        Err(OutputError::BackendNotFound(_))
    ));
}
