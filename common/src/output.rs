use std::{fmt, path::Path, str::FromStr};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{read, write};

use crate::record::{Dims, Metrics, Record};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bincode" => Ok(Self::Bincode),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("unsupported output format '{s}' (bincode, json, csv)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bincode => "bincode",
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

/// Flat CSV layout: one column per field, metric columns named after
/// [`Metrics::LABELS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CsvRow {
    test_type: String,
    threads: u32,
    image_size: u32,
    #[serde(rename = "TC")]
    tc: f64,
    #[serde(rename = "StdTC")]
    std_tc: f64,
    #[serde(rename = "CSW")]
    csw: f64,
    #[serde(rename = "StdCSW")]
    std_csw: f64,
    #[serde(rename = "CPUmg")]
    cpu_mg: f64,
    #[serde(rename = "StdCPUmg")]
    std_cpu_mg: f64,
    #[serde(rename = "PF")]
    pf: f64,
    #[serde(rename = "StdPF")]
    std_pf: f64,
    #[serde(rename = "ET")]
    et: f64,
    #[serde(rename = "StdET")]
    std_et: f64,
}

impl From<&Record> for CsvRow {
    fn from(record: &Record) -> Self {
        let m = &record.metrics;
        Self {
            test_type: record.test_type.clone(),
            threads: record.dims.threads,
            image_size: record.dims.image_size,
            tc: m.tc,
            std_tc: m.std_tc,
            csw: m.csw,
            std_csw: m.std_csw,
            cpu_mg: m.cpu_mg,
            std_cpu_mg: m.std_cpu_mg,
            pf: m.pf,
            std_pf: m.std_pf,
            et: m.et,
            std_et: m.std_et,
        }
    }
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        Self {
            test_type: row.test_type,
            dims: Dims {
                threads: row.threads,
                image_size: row.image_size,
            },
            metrics: Metrics {
                tc: row.tc,
                std_tc: row.std_tc,
                csw: row.csw,
                std_csw: row.std_csw,
                cpu_mg: row.cpu_mg,
                std_cpu_mg: row.std_cpu_mg,
                pf: row.pf,
                std_pf: row.std_pf,
                et: row.et,
                std_et: row.std_et,
            },
        }
    }
}

/// Keeps the records whose image size does not exceed `max_image_size`.
pub fn filter_by_image_size(records: Vec<Record>, max_image_size: u32) -> Vec<Record> {
    records
        .into_iter()
        .filter(|r| r.dims.image_size <= max_image_size)
        .collect()
}

pub fn encode(records: &[Record], format: OutputFormat) -> Result<Vec<u8>> {
    Ok(match format {
        OutputFormat::Bincode => bincode::serialize(records).context("Encoding bincode")?,
        OutputFormat::Json => serde_json::to_vec_pretty(records).context("Encoding json")?,
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for record in records {
                writer
                    .serialize(CsvRow::from(record))
                    .context("Encoding csv row")?;
            }
            writer.into_inner().context("Flushing csv")?
        }
    })
}

pub fn decode(data: &[u8], format: OutputFormat) -> Result<Vec<Record>> {
    Ok(match format {
        OutputFormat::Bincode => bincode::deserialize(data).context("Decoding bincode")?,
        OutputFormat::Json => serde_json::from_slice(data).context("Decoding json")?,
        OutputFormat::Csv => csv::Reader::from_reader(data)
            .deserialize::<CsvRow>()
            .map(|row| row.map(Record::from))
            .collect::<Result<_, _>>()
            .context("Decoding csv")?,
    })
}

/// Writes `records` to `path`, replacing any existing file.
pub async fn write_records(records: &[Record], path: &Path, format: OutputFormat) -> Result<()> {
    let data = encode(records, format)?;
    write(path, data)
        .await
        .context(format!("Writing {}", path.display()))
}

pub async fn read_records(path: &Path, format: OutputFormat) -> Result<Vec<Record>> {
    let data = read(path)
        .await
        .context(format!("Reading {}", path.display()))?;
    decode(&data, format).context(format!("Parsing {}", path.display()))
}
