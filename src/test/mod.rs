use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    cli::Cli,
    device::{Discover, TIMEOUT, UsbDiscovery},
    error::SessionError,
    report::{NO_PORTS_DETECTED, SessionReport},
    test::test_config::{MissingDevicePolicy, OutputConfig, SessionConfig},
};


pub fn run(opts: Cli) -> Result<ExitCode> {
    let conf = opts.session_config()?;
    let out = opts.output_config();
    info!(
        limits = ?conf.limits,
        secs = conf.loopback.duration.as_secs_f64(),
        pkt = conf.loopback.packet_size,
        "starting USB test"
    );

    let bus = match UsbDiscovery::new(TIMEOUT) {
        Ok(bus) => bus,
        Err(err) => return Ok(tester_unavailable(&SessionError::Discovery(err), &out)),
    };
    Ok(run_with(&bus, &conf, &out))
}

/// Run one session against `bus`, print, persist, and map the outcome to an exit status.
pub fn run_with<D: Discover>(bus: &D, conf: &SessionConfig, out: &OutputConfig) -> ExitCode {
    let report = match runner::run_session(bus, conf, |r| summary(out, r.summary_line())) {
        Ok(report) => report,
        // nothing could be tested: report it and let the policy decide
        Err(err) => return tester_unavailable(&err, out),
    };

    if report.error.as_deref() == Some(NO_PORTS_DETECTED) {
        summary(out, format!("USB TEST: FAIL — {NO_PORTS_DETECTED}"));
    }
    persist(&report, out);

    info!(overall_pass = report.overall_pass, ports = ?report.tested_ports, "USB test done");
    if report.overall_pass {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// The tester could not be opened or queried at all.
fn tester_unavailable(err: &SessionError, out: &OutputConfig) -> ExitCode {
    warn!(%err, "tester unavailable");
    summary(out, format!("USB TEST: {err}"));
    let report = SessionReport::failed(err.to_string()).finalize();
    persist(&report, out);
    match out.missing_device {
        MissingDevicePolicy::Pass => ExitCode::SUCCESS,
        MissingDevicePolicy::Fail => ExitCode::FAILURE,
    }
}

fn summary(out: &OutputConfig, line: String) {
    if !out.json_only {
        println!("{line}");
    }
}

fn persist(report: &SessionReport, out: &OutputConfig) {
    match report.persist(&out.report_path) {
        Ok(()) => info!(path = %out.report_path.display(), "report written"),
        Err(err) => warn!(path = %out.report_path.display(), %err, "could not write report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockBus;
    use crate::error::DeviceError;
    use crate::test::test_config::{LoopbackConfig, TestLimits};
    use std::path::Path;
    use std::time::Duration;

    fn conf() -> SessionConfig {
        SessionConfig {
            limits: TestLimits {
                min_thr_mbps: 0.001,
                ..TestLimits::default()
            },
            loopback: LoopbackConfig {
                max_packets: Some(4),
                packet_size: 128,
                ..LoopbackConfig::default()
            },
            settle: Duration::ZERO,
            reenum_timeout: Duration::ZERO,
            inter_port: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn out(path: &Path, missing_device: MissingDevicePolicy) -> OutputConfig {
        OutputConfig {
            report_path: path.to_path_buf(),
            json_only: true,
            missing_device,
        }
    }

    fn read(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn passing_session_exits_zero_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let bus = MockBus::with(|st| st.port_map = Some(0b0000_0110));
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::SUCCESS);
        let json = read(&path);
        assert_eq!(json["tested_ports"], serde_json::json!([1, 2]));
        assert_eq!(json["overall_pass"], true);
    }

    #[test]
    fn no_ports_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let bus = MockBus::with(|st| st.port_map = Some(0));
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(read(&path)["error"], "no ports detected");
    }

    #[test]
    fn missing_device_follows_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let bus = MockBus::with(|st| st.present = false);
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::SUCCESS);
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Fail));
        assert_eq!(code, ExitCode::FAILURE);
        let json = read(&path);
        assert!(json["error"].as_str().unwrap().starts_with("device not found"));
    }

    #[test]
    fn unreadable_port_map_follows_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let bus = MockBus::with(|st| st.port_map = None);
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::SUCCESS);
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Fail));
        assert_eq!(code, ExitCode::FAILURE);
        let json = read(&path);
        assert_eq!(json["error"], "port map request: transfer timed out");
        assert_eq!(json["overall_pass"], false);
    }

    #[test]
    fn usb_init_failure_is_reported_like_a_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let err = SessionError::Discovery(DeviceError::Usb(rusb::Error::Access));
        let code = tester_unavailable(&err, &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::SUCCESS);
        let code = tester_unavailable(&err, &out(&path, MissingDevicePolicy::Fail));
        assert_eq!(code, ExitCode::FAILURE);
        let json = read(&path);
        assert_eq!(json["error"], err.to_string());
        assert!(json["per_port"].as_array().unwrap().is_empty());
    }

    #[test]
    fn failing_port_exits_one_even_if_report_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let bus = MockBus::with(|st| {
            st.port_map = Some(0b0000_0010);
            st.echo.insert(1, Some(3));
        });
        let code = run_with(&bus, &conf(), &out(&path, MissingDevicePolicy::Pass));
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!path.exists());
    }
}
