use std::fmt;

use serde::{Deserialize, Serialize};

/// Thread count and image size announced by a `Starting` line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    pub threads: u32,
    pub image_size: u32,
}

/// A measured value together with its relative deviation in percent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub deviation: f64,
}

impl Sample {
    pub fn new(value: f64, deviation: f64) -> Self {
        Self { value, deviation }
    }
}

/// Counters reported by `perf stat` ahead of the elapsed time line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    TaskClock = 0,
    ContextSwitches = 1,
    CpuMigrations = 2,
    PageFaults = 3,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::TaskClock,
        Counter::ContextSwitches,
        Counter::CpuMigrations,
        Counter::PageFaults,
    ];

    pub fn from_event(event: &str) -> Option<Self> {
        match event {
            "task-clock" => Some(Self::TaskClock),
            "context-switches" => Some(Self::ContextSwitches),
            "cpu-migrations" => Some(Self::CpuMigrations),
            "page-faults" => Some(Self::PageFaults),
            _ => None,
        }
    }

    pub fn event(&self) -> &'static str {
        match self {
            Self::TaskClock => "task-clock",
            Self::ContextSwitches => "context-switches",
            Self::CpuMigrations => "cpu-migrations",
            Self::PageFaults => "page-faults",
        }
    }
}

/// The ten values extracted from one benchmark block.
///
/// Field order is part of the on-disk format: consumers index the
/// serialized sequence positionally, see [`Metrics::LABELS`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// task-clock in msec
    pub tc: f64,
    pub std_tc: f64,
    pub csw: f64,
    pub std_csw: f64,
    pub cpu_mg: f64,
    pub std_cpu_mg: f64,
    pub pf: f64,
    pub std_pf: f64,
    /// elapsed wall-clock time in seconds
    pub et: f64,
    pub std_et: f64,
}

impl Metrics {
    pub const LABELS: [&'static str; 10] = [
        "TC", "StdTC", "CSW", "StdCSW", "CPUmg", "StdCPUmg", "PF", "StdPF", "ET", "StdET",
    ];

    pub fn new(
        task_clock: Sample,
        context_switches: Sample,
        cpu_migrations: Sample,
        page_faults: Sample,
        elapsed: Sample,
    ) -> Self {
        Self {
            tc: task_clock.value,
            std_tc: task_clock.deviation,
            csw: context_switches.value,
            std_csw: context_switches.deviation,
            cpu_mg: cpu_migrations.value,
            std_cpu_mg: cpu_migrations.deviation,
            pf: page_faults.value,
            std_pf: page_faults.deviation,
            et: elapsed.value,
            std_et: elapsed.deviation,
        }
    }

    pub fn as_array(&self) -> [f64; 10] {
        [
            self.tc,
            self.std_tc,
            self.csw,
            self.std_csw,
            self.cpu_mg,
            self.std_cpu_mg,
            self.pf,
            self.std_pf,
            self.et,
            self.std_et,
        ]
    }
}

/// One completed `Starting ... seconds` block of a log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub test_type: String,
    pub dims: Dims,
    pub metrics: Metrics,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            self.test_type, self.dims.threads, self.dims.image_size
        )?;
        for value in self.metrics.as_array() {
            write!(f, "\t{value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_events_round_trip() {
        for counter in Counter::ALL {
            assert_eq!(Counter::from_event(counter.event()), Some(counter));
        }
        assert_eq!(Counter::from_event("seconds"), None);
        assert_eq!(Counter::from_event("cycles"), None);
    }

    #[test]
    fn metrics_follow_label_order() {
        let metrics = Metrics::new(
            Sample::new(1.0, 2.0),
            Sample::new(3.0, 4.0),
            Sample::new(5.0, 6.0),
            Sample::new(7.0, 8.0),
            Sample::new(9.0, 10.0),
        );
        assert_eq!(
            metrics.as_array(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]
        );
        assert_eq!(Metrics::LABELS[4], "CPUmg");
        assert_eq!(Metrics::LABELS[6], "PF");
    }

    #[test]
    fn display_is_tab_separated() {
        let record = Record {
            test_type: "pth".to_owned(),
            dims: Dims {
                threads: 8,
                image_size: 512,
            },
            metrics: Metrics {
                tc: 1.5,
                ..Default::default()
            },
        };
        let line = record.to_string();
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 13);
        assert_eq!(&fields[..4], &["pth", "8", "512", "1.5"]);
    }
}
