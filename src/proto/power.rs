use serde::Serialize;

use crate::error::PowerReportError;

/// Load steps the device reports per array, used or not.
pub const MAX_STEPS: usize = 5;

/// `<BBB HH 5H*8 HHH>`
pub const POWER_REPORT_SIZE: usize = 3 + 2 * 2 + 8 * MAX_STEPS * 2 + 3 * 2;

/// Per-port power telemetry, arrays already truncated to `n_steps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PowerReport {
    pub port: u8,
    pub n_steps: u8,
    pub flags: u8,
    #[serde(rename = "maxpower_mA")]
    pub maxpower_ma: u16,
    #[serde(rename = "v_idle_mV")]
    pub v_idle_mv: u16,
    #[serde(rename = "loads_mA")]
    pub loads_ma: Vec<u16>,
    #[serde(rename = "v_mean_mV")]
    pub v_mean_mv: Vec<u16>,
    #[serde(rename = "v_min_mV")]
    pub v_min_mv: Vec<u16>,
    #[serde(rename = "v_max_mV")]
    pub v_max_mv: Vec<u16>,
    #[serde(rename = "droop_mV")]
    pub droop_mv: Vec<u16>,
    #[serde(rename = "ripple_mVpp")]
    pub ripple_mvpp: Vec<u16>,
    #[serde(rename = "current_mA")]
    pub current_ma: Vec<u16>,
    pub recovery_us: Vec<u16>,
    #[serde(rename = "max_current_mA")]
    pub max_current_ma: u16,
    #[serde(rename = "ocp_at_mA")]
    pub ocp_at_ma: u16,
    pub errors: u16,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    /// Reads a full wire array and keeps the first `keep` entries.
    fn steps(&mut self, keep: usize) -> Vec<u16> {
        let mut all: Vec<u16> = (0..MAX_STEPS).map(|_| self.u16()).collect();
        all.truncate(keep);
        all
    }
}

pub fn decode_power_report(blob: &[u8]) -> Result<PowerReport, PowerReportError> {
    if blob.len() != POWER_REPORT_SIZE {
        return Err(PowerReportError::Length {
            got: blob.len(),
            expected: POWER_REPORT_SIZE,
        });
    }
    let mut r = Reader { buf: blob, pos: 0 };

    let port = r.u8();
    let n_steps = r.u8();
    let flags = r.u8();
    let maxpower_ma = r.u16();
    let v_idle_mv = r.u16();

    let keep = (n_steps as usize).min(MAX_STEPS);
    Ok(PowerReport {
        port,
        n_steps,
        flags,
        maxpower_ma,
        v_idle_mv,
        loads_ma: r.steps(keep),
        v_mean_mv: r.steps(keep),
        v_min_mv: r.steps(keep),
        v_max_mv: r.steps(keep),
        droop_mv: r.steps(keep),
        ripple_mvpp: r.steps(keep),
        current_ma: r.steps(keep),
        recovery_us: r.steps(keep),
        max_current_ma: r.u16(),
        ocp_at_ma: r.u16(),
        errors: r.u16(),
    })
}

/// Wire encoding of a report, used to feed decoders in tests and the mock tester.
#[cfg(test)]
pub fn encode_power_report(report: &PowerReport) -> Vec<u8> {
    let mut out = Vec::with_capacity(POWER_REPORT_SIZE);
    out.extend_from_slice(&[report.port, report.n_steps, report.flags]);
    out.extend_from_slice(&report.maxpower_ma.to_le_bytes());
    out.extend_from_slice(&report.v_idle_mv.to_le_bytes());
    for arr in [
        &report.loads_ma,
        &report.v_mean_mv,
        &report.v_min_mv,
        &report.v_max_mv,
        &report.droop_mv,
        &report.ripple_mvpp,
        &report.current_ma,
        &report.recovery_us,
    ] {
        for i in 0..MAX_STEPS {
            out.extend_from_slice(&arr.get(i).copied().unwrap_or(0).to_le_bytes());
        }
    }
    out.extend_from_slice(&report.max_current_ma.to_le_bytes());
    out.extend_from_slice(&report.ocp_at_ma.to_le_bytes());
    out.extend_from_slice(&report.errors.to_le_bytes());
    out
}
