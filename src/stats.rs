use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Stats {
    pub packets: u64,
    pub bytes_sent: u64,
    pub bytes_rcvd: u64,
    pub errors: u64,
    t0: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            packets: 0,
            bytes_sent: 0,
            bytes_rcvd: 0,
            errors: 0,
            t0: Instant::now(),
        }
    }
    pub fn add_sent(&mut self, n: usize) {
        self.bytes_sent += n as u64;
    }
    pub fn add_rcvd(&mut self, n: usize) {
        self.bytes_rcvd += n as u64;
    }
    pub fn inc_packets(&mut self) {
        self.packets += 1;
    }
    pub fn inc_errors(&mut self) {
        self.errors += 1;
    }
    pub fn elapsed(&self) -> Duration {
        self.t0.elapsed()
    }

    /// Freeze the clock and compute throughput over the measured wall time.
    pub fn finish(self) -> BulkMetrics {
        BulkMetrics::from_counts(
            self.bytes_sent,
            self.bytes_rcvd,
            self.errors,
            self.packets,
            self.t0.elapsed(),
        )
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Loopback outcome for one port.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkMetrics {
    pub bytes_sent: u64,
    pub bytes_rcvd: u64,
    pub seconds: f64,
    #[serde(rename = "throughput_Bps")]
    pub throughput_bps: f64,
    #[serde(rename = "throughput_Mbps")]
    pub throughput_mbps: f64,
    pub errors: u64,
    pub packets: u64,
}

impl BulkMetrics {
    pub fn from_counts(
        bytes_sent: u64,
        bytes_rcvd: u64,
        errors: u64,
        packets: u64,
        elapsed: Duration,
    ) -> Self {
        let seconds = elapsed.as_secs_f64().max(1e-3);
        let bps_bytes = bytes_rcvd as f64 / seconds;
        Self {
            bytes_sent,
            bytes_rcvd,
            seconds,
            throughput_bps: bps_bytes,
            throughput_mbps: bps_bytes * 8.0 / 1e6,
            errors,
            packets,
        }
    }
}
