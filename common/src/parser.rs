use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::{Counter, Dims, Metrics, Record, Sample};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("invalid {field} '{token}'")]
    InvalidNumber { field: &'static str, token: String },
    #[error("missing {0}")]
    MissingField(&'static str),
}

/// What a single log line contributes to the block being assembled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Line {
    Blank,
    Ignored,
    Starting(Dims),
    Counter(Counter, Sample),
    Elapsed(Sample),
}

impl Line {
    pub fn from_line(line: &str) -> Result<Self, LineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return Ok(Self::Blank);
        };

        if *first == "Starting" {
            return parse_dims(&tokens[1..]).map(Self::Starting);
        }

        let Some(event_idx) = event_position(&tokens) else {
            return Ok(Self::Ignored);
        };
        let event = tokens[event_idx];
        let counter = Counter::from_event(event);
        // `seconds user` and `seconds sys` follow the elapsed line on single runs
        let is_elapsed = event == "seconds"
            && tokens.get(event_idx + 1..event_idx + 3) == Some(&["time", "elapsed"][..]);
        if counter.is_none() && !is_elapsed {
            return Ok(Self::Ignored);
        }

        let primary = first.replace(',', "");
        match counter {
            Some(counter) => {
                let value = parse_float(counter.event(), &primary)?;
                let deviation = match tokens.iter().filter(|t| t.contains('%')).exactly_one() {
                    Ok(token) => {
                        parse_float("deviation", strip_percent(token.trim_start_matches("+-")))?
                    }
                    Err(_) => 0.0,
                };
                Ok(Self::Counter(counter, Sample::new(value, deviation)))
            }
            None => {
                let value = parse_float("elapsed time", &primary)?;
                // the relative spread sits five tokens after `seconds`: `time elapsed ( +- N% )`
                let deviation = match tokens.get(event_idx + 5) {
                    Some(token) => parse_float("elapsed time deviation", strip_percent(token))?,
                    None => 0.0,
                };
                Ok(Self::Elapsed(Sample::new(value, deviation)))
            }
        }
    }
}

/// Position of the event name. Newer `perf` releases print a `msec` unit
/// before task-clock and an absolute `+- <spread>` pair before `seconds`.
fn event_position(tokens: &[&str]) -> Option<usize> {
    let idx = match *tokens.get(1)? {
        "msec" => 2,
        "+-" => 3,
        _ => 1,
    };
    (idx < tokens.len()).then_some(idx)
}

fn parse_dims(tokens: &[&str]) -> Result<Dims, LineError> {
    let mut values = tokens
        .iter()
        .filter_map(|t| t.split_once('='))
        .map(|(_, value)| value.replace(',', ""));
    let threads = values
        .next()
        .ok_or(LineError::MissingField("thread count"))?;
    let image_size = values.next().ok_or(LineError::MissingField("image size"))?;

    Ok(Dims {
        threads: parse_int("thread count", &threads)?,
        image_size: parse_int("image size", &image_size)?,
    })
}

fn strip_percent(token: &str) -> &str {
    token.split_once('%').map_or(token, |(number, _)| number).trim()
}

fn parse_int(field: &'static str, token: &str) -> Result<u32, LineError> {
    token.trim().parse().map_err(|_| LineError::InvalidNumber {
        field,
        token: token.to_owned(),
    })
}

fn parse_float(field: &'static str, token: &str) -> Result<f64, LineError> {
    token.parse().map_err(|_| LineError::InvalidNumber {
        field,
        token: token.to_owned(),
    })
}

/// What to do with a block that reached its `seconds` line while some
/// counters were never recorded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IncompletePolicy {
    /// Emit the record with 0.0 in the missing slots.
    #[default]
    Keep,
    Drop,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub records: usize,
    pub malformed_lines: usize,
    pub incomplete_blocks: usize,
    pub discarded_blocks: usize,
}

/// Assembles records from the lines of one log file.
pub struct BlockParser<'a> {
    source: &'a str,
    test_type: &'a str,
    policy: IncompletePolicy,
    dims: Option<Dims>,
    counters: [Option<Sample>; 4],
    summary: FileSummary,
}

impl<'a> BlockParser<'a> {
    /// `source` names the file in diagnostics.
    pub fn new(source: &'a str, test_type: &'a str, policy: IncompletePolicy) -> Self {
        Self {
            source,
            test_type,
            policy,
            dims: None,
            counters: Default::default(),
            summary: FileSummary::default(),
        }
    }

    fn is_pending(&self) -> bool {
        self.dims.is_some() || self.counters.iter().any(Option::is_some)
    }

    /// Feeds one line, `line_no` being 1-based. Returns a record when the
    /// line closes a block.
    pub fn feed(&mut self, line_no: usize, line: &str) -> Option<Record> {
        match Line::from_line(line) {
            Ok(Line::Blank | Line::Ignored) => None,
            Ok(Line::Starting(dims)) => {
                if self.is_pending() {
                    warn!(
                        "{}:{line_no}: new block started before the previous one finished, discarding it",
                        self.source
                    );
                    self.summary.discarded_blocks += 1;
                }
                self.counters = Default::default();
                self.dims = Some(dims);
                debug!(
                    "{}: block with {} threads, image size {}",
                    self.source, dims.threads, dims.image_size
                );
                None
            }
            Ok(Line::Counter(counter, sample)) => {
                if self.counters[counter as usize].replace(sample).is_some() {
                    warn!(
                        "{}:{line_no}: {} reported twice in one block, keeping the last value",
                        self.source,
                        counter.event()
                    );
                }
                None
            }
            Ok(Line::Elapsed(elapsed)) => self.finish_block(line_no, elapsed),
            Err(err) => {
                self.summary.malformed_lines += 1;
                warn!("{}:{line_no}: error parsing line: {err}", self.source);
                None
            }
        }
    }

    fn finish_block(&mut self, line_no: usize, elapsed: Sample) -> Option<Record> {
        let counters = std::mem::take(&mut self.counters);
        let Some(dims) = self.dims.take() else {
            warn!(
                "{}:{line_no}: elapsed time without a preceding Starting line, discarding block",
                self.source
            );
            self.summary.discarded_blocks += 1;
            return None;
        };

        let missing = Counter::ALL
            .iter()
            .filter(|c| counters[**c as usize].is_none())
            .map(|c| c.event())
            .join(", ");
        if !missing.is_empty() {
            self.summary.incomplete_blocks += 1;
            if self.policy == IncompletePolicy::Drop {
                warn!(
                    "{}:{line_no}: block is missing {missing}, dropping it",
                    self.source
                );
                self.summary.discarded_blocks += 1;
                return None;
            }
            warn!(
                "{}:{line_no}: block is missing {missing}, recording 0",
                self.source
            );
        }

        let sample = |counter: Counter| counters[counter as usize].unwrap_or_default();
        self.summary.records += 1;
        Some(Record {
            test_type: self.test_type.to_owned(),
            dims,
            metrics: Metrics::new(
                sample(Counter::TaskClock),
                sample(Counter::ContextSwitches),
                sample(Counter::CpuMigrations),
                sample(Counter::PageFaults),
                elapsed,
            ),
        })
    }

    pub fn finish(mut self) -> FileSummary {
        if self.is_pending() {
            warn!(
                "{}: log ended inside a block without an elapsed time line, discarding it",
                self.source
            );
            self.summary.discarded_blocks += 1;
        }
        self.summary
    }
}

/// Extracts every completed block from the contents of one log file.
pub fn parse_log(
    source: &str,
    test_type: &str,
    content: &str,
    policy: IncompletePolicy,
) -> (Vec<Record>, FileSummary) {
    let mut parser = BlockParser::new(source, test_type, policy);
    let records = content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| parser.feed(idx + 1, line))
        .collect();
    (records, parser.finish())
}
