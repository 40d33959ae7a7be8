use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::{Args, Parser};

use crate::test::test_config::{
    DEFAULT_MAX_DROOP_MV, DEFAULT_MAX_RECOVERY_US, DEFAULT_MAX_RIPPLE_MVPP, DEFAULT_MIN_THR_MBPS,
    DEFAULT_PKT_SIZE, DEFAULT_REPORT_PATH, DEFAULT_TEST_SECS, DEFAULT_V_MAX_MV, DEFAULT_V_MIN_MV,
    LoopbackConfig, MissingDevicePolicy, OutputConfig, SessionConfig, TestLimits,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "usb-hammer",
    about = "USB loopback & power test for multi-port USB testers"
)]
pub struct Cli {
    #[command(flatten)]
    pub limits: LimitOpts,
    #[command(flatten)]
    pub bulk: BulkOpts,
    #[command(flatten)]
    pub session: SessionOpts,
    /// Where the JSON report is written
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    pub report: PathBuf,
    /// Only write the JSON report (no human summary)
    #[arg(long, default_value_t = false)]
    pub json_only: bool,
    /// Exit status when no tester is attached
    #[arg(long, value_enum, default_value_t = MissingDevicePolicy::Pass)]
    pub missing_device: MissingDevicePolicy,
}

#[derive(Args, Debug, Clone)]
pub struct LimitOpts {
    /// Minimum loopback throughput (Mb/s)
    #[arg(long, default_value_t = DEFAULT_MIN_THR_MBPS)]
    pub min_thr_mbps: f64,
    /// Lowest acceptable voltage under load (mV)
    #[arg(long, default_value_t = DEFAULT_V_MIN_MV)]
    pub v_min_mv: u32,
    /// Highest acceptable voltage (mV)
    #[arg(long, default_value_t = DEFAULT_V_MAX_MV)]
    pub v_max_mv: u32,
    /// Maximum droop on a load step (mV)
    #[arg(long, default_value_t = DEFAULT_MAX_DROOP_MV)]
    pub max_droop_mv: u32,
    /// Maximum ripple (mV peak-to-peak)
    #[arg(long, default_value_t = DEFAULT_MAX_RIPPLE_MVPP)]
    pub max_ripple_mvpp: u32,
    /// Maximum recovery time after a load step (µs)
    #[arg(long, default_value_t = DEFAULT_MAX_RECOVERY_US)]
    pub max_recovery_us: u32,
}

#[derive(Args, Debug, Clone)]
pub struct BulkOpts {
    /// Loopback duration per port in seconds
    #[arg(long, default_value_t = DEFAULT_TEST_SECS)]
    pub secs: f64,
    /// Loopback packet size in bytes, header included
    #[arg(long, default_value_t = DEFAULT_PKT_SIZE)]
    pub pkt: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SessionOpts {
    /// Wait after a port switch before looking for the device again (ms)
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,
    /// Give up on re-enumeration after this long (ms)
    #[arg(long, default_value_t = 5000)]
    pub reenum_timeout_ms: u64,
}

impl Cli {
    pub fn limits(&self) -> TestLimits {
        let l = &self.limits;
        TestLimits {
            min_thr_mbps: l.min_thr_mbps,
            v_min_mv: l.v_min_mv,
            v_max_mv: l.v_max_mv,
            max_droop_mv: l.max_droop_mv,
            max_ripple_mvpp: l.max_ripple_mvpp,
            max_recovery_us: l.max_recovery_us,
            ..TestLimits::default()
        }
    }

    /// Validate and freeze everything a session needs.
    pub fn session_config(&self) -> Result<SessionConfig> {
        ensure!(
            self.bulk.secs.is_finite() && self.bulk.secs > 0.0,
            "--secs must be a positive number of seconds"
        );
        ensure!(
            self.limits.v_min_mv <= self.limits.v_max_mv,
            "--v-min-mv ({}) is above --v-max-mv ({})",
            self.limits.v_min_mv,
            self.limits.v_max_mv
        );
        Ok(SessionConfig {
            limits: self.limits(),
            loopback: LoopbackConfig {
                duration: Duration::from_secs_f64(self.bulk.secs),
                packet_size: self.bulk.pkt,
                ..LoopbackConfig::default()
            },
            settle: Duration::from_millis(self.session.settle_ms),
            reenum_timeout: Duration::from_millis(self.session.reenum_timeout_ms),
            ..SessionConfig::default()
        })
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            report_path: self.report.clone(),
            json_only: self.json_only,
            missing_device: self.missing_device,
        }
    }
}
