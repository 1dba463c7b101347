use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use mri_anvil::RegionSummary;

/// Counters shared by all conversion workers.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    // Files
    pub files_converted: AtomicUsize,
    pub files_failed: AtomicUsize,

    // Content
    pub chunks: AtomicUsize,
    pub sections: AtomicUsize,

    // Sizes
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,

    // Time per stage, and how many files each stage timed
    pub parse_time_us: AtomicU64,
    pub write_time_us: AtomicU64,
    pub verify_time_us: AtomicU64,
    pub parse_count: AtomicUsize,
    pub write_count: AtomicUsize,
    pub verify_count: AtomicUsize,

    // Session
    pub start_time: Option<Instant>,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_parse(&self, duration: Duration, bytes_in: usize, summary: &RegionSummary) {
        self.parse_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.parse_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in as u64, Ordering::Relaxed);
        self.chunks.fetch_add(summary.chunks, Ordering::Relaxed);
        self.sections.fetch_add(summary.sections, Ordering::Relaxed);
    }

    pub fn record_write(&self, duration: Duration, bytes_out: u64) {
        self.write_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes_out, Ordering::Relaxed);
    }

    pub fn record_verify(&self, duration: Duration) {
        self.verify_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.verify_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_converted(&self) {
        self.files_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.unwrap_or_else(Instant::now).elapsed();
        let converted = self.files_converted.load(Ordering::Relaxed);
        let failed = self.files_failed.load(Ordering::Relaxed);

        let chunks = self.chunks.load(Ordering::Relaxed);
        let sections = self.sections.load(Ordering::Relaxed);

        let bytes_in = self.bytes_in.load(Ordering::Relaxed);
        let bytes_out = self.bytes_out.load(Ordering::Relaxed);
        let ratio = if bytes_out > 0 { bytes_in as f64 / bytes_out as f64 } else { 0.0 };

        let parse_time = self.parse_time_us.load(Ordering::Relaxed) as f64 / 1000.0; // ms
        let write_time = self.write_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let verify_time = self.verify_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let per_file = |total: f64, count: &AtomicUsize| match count.load(Ordering::Relaxed) {
            0 => 0.0,
            files => total / files as f64,
        };

        format!(
            "MRI Conversion Report\n\
             =====================\n\
             Session Duration: {:.2?}\n\n\
             [Files]\n\
             Converted: {}\n\
             Failed: {}\n\n\
             [Content]\n\
             Chunks: {}\n\
             Sections: {}\n\n\
             [Size]\n\
             Region Bytes: {}\n\
             Archive Bytes: {}\n\
             Ratio: {:.2}x\n\n\
             [Time]\n\
             Parse: {:.2} ms/file\n\
             Write: {:.2} ms/file\n\
             Verify: {:.2} ms/file\n",
            uptime,
            converted, failed,
            chunks, sections,
            bytes_in, bytes_out, ratio,
            per_file(parse_time, &self.parse_count),
            per_file(write_time, &self.write_count),
            per_file(verify_time, &self.verify_count),
        )
    }
}
