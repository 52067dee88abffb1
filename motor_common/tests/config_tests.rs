//! Output config loading tests.
//!
//! Tests for `OutputConfig::load()`: file discovery, section defaults, pin
//! tag parsing, protocol names and validation failures.

use motor_common::config::{ConfigError, ConfigLoader, LogLevel};
use motor_common::output::config::OutputConfig;
use motor_common::output::types::{IoTag, MotorProtocol, TimerClocks, TimerId, TimerUsage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write `content` as output.toml in the given directory.
fn write_output_toml(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("output.toml");
    fs::write(&path, content).unwrap();
    path
}

const FULL: &str = r#"
backend = "simulation"

[shared]
log_level = "debug"
service_name = "bench"

[motor]
protocol = "multishot"
motor_count = 2
io_tags = ["PA8", "PB10"]
pwm_rate = 480
inversion = true
idle_pulse = 1050

[servo]
io_tags = ["PB6"]

[beeper]
io_tag = "PB4"
frequency = 2700

[clocks]
multishot_mhz = 84

[[timers]]
tag = "PA8"
timer = 1
channel = 1
usage = ["motor"]

[[timers]]
tag = "PB10"
timer = 2
channel = 3
n_channel = true
usage = ["motor"]

[[timers]]
tag = "PB6"
timer = 4
channel = 1
usage = ["servo", "motor"]

[[timers]]
tag = "PB4"
timer = 3
channel = 1
usage = ["beeper"]
"#;

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_output_toml(dir.path(), FULL);

    let config = OutputConfig::load(&path).expect("load");
    config.validate().expect("validate");

    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "bench");
    assert_eq!(config.motor.protocol, MotorProtocol::MultiShot);
    assert_eq!(config.motor.io_tags[1], IoTag::new(1, 10).unwrap());
    assert!(config.motor.inversion);
    assert_eq!(config.motor.idle_pulse, 1050);

    let servo = config.servo.as_ref().expect("servo section");
    assert_eq!(servo.pwm_rate, 50);
    assert_eq!(servo.center_pulse, 1500);

    assert_eq!(config.beeper.as_ref().map(|b| b.frequency), Some(2700));

    assert_eq!(config.clocks.multishot_mhz, 84);
    assert_eq!(config.clocks.oneshot125_mhz, TimerClocks::default().oneshot125_mhz);

    let hw = config.timers[2].to_hardware();
    assert_eq!(hw.timer, TimerId(4));
    assert_eq!(hw.usage, TimerUsage::SERVO | TimerUsage::MOTOR);
    assert!(config.timers[1].to_hardware().output.contains(
        motor_common::output::types::OutputFlags::N_CHANNEL
    ));
}

#[test]
fn test_protocol_names() {
    for (name, protocol) in [
        ("standard", MotorProtocol::Standard),
        ("oneshot125", MotorProtocol::OneShot125),
        ("oneshot42", MotorProtocol::OneShot42),
        ("multishot", MotorProtocol::MultiShot),
        ("brushed", MotorProtocol::Brushed),
        ("onboard_esc", MotorProtocol::OnboardEsc),
        ("dshot150", MotorProtocol::Dshot150),
        ("dshot300", MotorProtocol::Dshot300),
        ("dshot600", MotorProtocol::Dshot600),
        ("dshot1200", MotorProtocol::Dshot1200),
    ] {
        let config = OutputConfig::from_toml(&format!(
            "[motor]\nprotocol = \"{name}\"\nmotor_count = 1\n"
        ))
        .expect("parse");
        assert_eq!(config.motor.protocol, protocol);
        assert_eq!(protocol.to_string(), name);
    }
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = OutputConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn test_unknown_protocol_is_parse_error() {
    let result = OutputConfig::from_toml("[motor]\nprotocol = \"proshot\"\nmotor_count = 4\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_bad_pin_tag_is_parse_error() {
    let result = OutputConfig::from_toml("[motor]\nmotor_count = 1\nio_tags = [\"Q8\"]\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));

    let result = OutputConfig::from_toml("[motor]\nmotor_count = 1\nio_tags = [\"PA16\"]\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_missing_motor_section_is_parse_error() {
    let result = OutputConfig::from_toml("backend = \"simulation\"\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_validation_failures() {
    let cases = [
        ("[motor]\nmotor_count = 13\n", "Too many motors"),
        ("[motor]\nmotor_count = 1\npwm_rate = 0\n", "pwm_rate"),
        (
            "[motor]\nmotor_count = 1\ncommand_delay_us = 0\n",
            "command_delay_us",
        ),
        (
            "[motor]\nmotor_count = 1\n[servo]\nio_tags = [\"PB6\"]\npwm_rate = 0\n",
            "servo.pwm_rate",
        ),
        (
            "[motor]\nmotor_count = 1\n[[timers]]\ntag = \"PA8\"\ntimer = 1\nchannel = 0\n",
            "start at 1",
        ),
        (
            "[motor]\nmotor_count = 1\n[shared]\nservice_name = \"\"\n",
            "service_name",
        ),
    ];

    for (toml, expected) in cases {
        let config = OutputConfig::from_toml(toml).expect("parse");
        match config.validate() {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains(expected), "'{msg}' should mention '{expected}'")
            }
            other => panic!("expected validation error for {toml:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_too_many_timers() {
    let mut toml = String::from("[motor]\nmotor_count = 0\n");
    for timer in 1..=17u8 {
        toml.push_str(&format!(
            "[[timers]]\ntag = \"P{}{}\"\ntimer = {timer}\nchannel = 1\n",
            char::from(b'A' + timer / 16),
            timer % 16
        ));
    }
    let config = OutputConfig::from_toml(&toml).expect("parse");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("Too many timers")
    ));
}
