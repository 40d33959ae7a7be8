use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::{
    error::ReportError,
    proto::{command::NEUTRAL_PORT, power::PowerReport},
    stats::BulkMetrics,
    test::{
        evaluate::{Rollup, VMIN_EMPTY, evaluate_port},
        test_config::TestLimits,
    },
};

pub const NO_PORTS_DETECTED: &str = "no ports detected";

fn echo_or_sentinel<S: Serializer>(echo: &Option<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i16(echo.map_or(-1, i16::from))
}

/// Raw measurements for one port, before limits are applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortMeasurement {
    pub port: u8,
    #[serde(flatten)]
    pub bulk: BulkMetrics,
    #[serde(serialize_with = "echo_or_sentinel")]
    pub device_port_echo: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_report: Option<PowerReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_report_error: Option<String>,
}

impl PortMeasurement {
    /// Nothing measured; used when the port could not be switched to.
    pub fn empty(port: u8) -> Self {
        Self {
            port,
            bulk: BulkMetrics::default(),
            device_port_echo: None,
            power_report: None,
            power_report_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortResult {
    #[serde(flatten)]
    pub measurement: PortMeasurement,
    pub pass: bool,
    pub fail_reasons: Vec<String>,
    pub rollup: Rollup,
}

impl PortResult {
    pub fn evaluate(measurement: PortMeasurement, limits: &TestLimits) -> Self {
        let eval = evaluate_port(&measurement, limits);
        Self {
            measurement,
            pass: eval.pass,
            fail_reasons: eval.reasons,
            rollup: eval.rollup,
        }
    }

    pub fn switch_failed(port: u8, reason: String) -> Self {
        Self {
            measurement: PortMeasurement::empty(port),
            pass: false,
            fail_reasons: vec![reason],
            rollup: Rollup::default(),
        }
    }

    pub fn port(&self) -> u8 {
        self.measurement.port
    }

    /// One human-readable line, as printed after each port.
    pub fn summary_line(&self) -> String {
        let status = if self.pass { "PASS" } else { "FAIL" };
        let r = &self.rollup;
        if self.port() == NEUTRAL_PORT {
            return format!(
                "USB Port {}: {:.2} Mbps — {}",
                self.port(),
                r.throughput_mbps,
                status
            );
        }
        let vmin_v = if r.vmin_mv == VMIN_EMPTY {
            0.0
        } else {
            r.vmin_mv as f64 / 1000.0
        };
        format!(
            "USB Port {}: {:.2} Mbps, Vmin {:.2} V, droop {} mV, ripple {} mVpp, Imax {} mA — {}",
            self.port(),
            r.throughput_mbps,
            vmin_v,
            r.max_droop_mv,
            r.max_ripple_mvpp,
            r.max_measured_current_ma,
            status
        )
    }
}

/// Everything one run produced. Finalized once, then persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub tested_ports: Vec<u8>,
    pub per_port: Vec<PortResult>,
    pub overall_pass: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: PortResult) {
        self.tested_ports.push(result.port());
        self.per_port.push(result);
    }

    /// Pass iff something was tested, nothing failed, and the run was not cut short.
    pub fn finalize(mut self) -> Self {
        self.overall_pass =
            self.error.is_none() && !self.per_port.is_empty() && self.per_port.iter().all(|r| r.pass);
        self
    }

    pub fn write_json(&self, w: impl Write) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(w, self)?;
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<(), ReportError> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_json(&mut w)?;
        w.flush()?;
        Ok(())
    }
}
