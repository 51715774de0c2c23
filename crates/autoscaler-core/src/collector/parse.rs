//! Prometheus text-exposition parsing, isolated behind [`MetricFamilyParser`]
//! so an alternative metric source could substitute a different wire format
//! without touching aggregation or quantile logic.

use std::collections::HashMap;

/// One labeled sample within a metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label set on this sample.
    pub labels: HashMap<String, String>,
    /// Sample value.
    pub value: f64,
}

/// A parsed metric family, already grouped by name and kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricFamily {
    /// A monotonically increasing counter.
    Counter {
        /// Metric name.
        name: String,
        /// All samples observed for this name in the scrape.
        samples: Vec<Sample>,
    },
    /// An instantaneous gauge (also used for untyped samples).
    Gauge {
        /// Metric name.
        name: String,
        /// All samples observed for this name in the scrape.
        samples: Vec<Sample>,
    },
    /// A histogram: cumulative `le` buckets plus `_sum`/`_count`.
    Histogram {
        /// Metric name (suffix-stripped).
        name: String,
        /// `(upper_bound, cumulative_count)` pairs, unsorted.
        buckets: Vec<(f64, f64)>,
        /// The `_sum` series value.
        sum: f64,
        /// The `_count` series value.
        count: f64,
    },
}

/// Parses a scrape body into metric families.
pub trait MetricFamilyParser: Send + Sync {
    /// Parse `body`, returning a human-readable error on malformed input.
    fn parse(&self, body: &str) -> Result<Vec<MetricFamily>, String>;
}

/// The standard Prometheus text exposition format: `# TYPE`/`# HELP`
/// comment lines, `name{label="value",...} value` sample lines, and the
/// `_bucket`/`_sum`/`_count` suffix convention for histograms with `+Inf`
/// as the final bucket's `le` label.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusTextParser;

impl MetricFamilyParser for PrometheusTextParser {
    fn parse(&self, body: &str) -> Result<Vec<MetricFamily>, String> {
        let mut types: HashMap<String, String> = HashMap::new();
        let mut simple: HashMap<String, Vec<Sample>> = HashMap::new();
        let mut hist_buckets: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
        let mut hist_sum: HashMap<String, f64> = HashMap::new();
        let mut hist_count: HashMap<String, f64> = HashMap::new();

        for raw_line in body.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("# TYPE") {
                let mut fields = rest.split_whitespace();
                let name = fields.next().unwrap_or_default().to_string();
                let kind = fields.next().unwrap_or_default().to_string();
                if !name.is_empty() {
                    types.insert(name, kind);
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                return Err(format!("malformed sample line: {line}"));
            }
            let name_and_labels = fields[0];
            let value: f64 = fields[1]
                .parse()
                .map_err(|_| format!("invalid sample value on line: {line}"))?;
            let (base_name, labels) = parse_name_and_labels(name_and_labels)?;

            if let Some(stripped) = base_name.strip_suffix("_bucket") {
                let le = labels
                    .get("le")
                    .ok_or_else(|| format!("histogram bucket missing le label: {line}"))?;
                let le_val = if le == "+Inf" {
                    f64::INFINITY
                } else {
                    le.parse()
                        .map_err(|_| format!("invalid le label on line: {line}"))?
                };
                hist_buckets
                    .entry(stripped.to_string())
                    .or_default()
                    .push((le_val, value));
                continue;
            }
            if let Some(stripped) = base_name.strip_suffix("_sum") {
                if types.get(stripped).map(String::as_str) == Some("histogram") {
                    hist_sum.insert(stripped.to_string(), value);
                    continue;
                }
            }
            if let Some(stripped) = base_name.strip_suffix("_count") {
                if types.get(stripped).map(String::as_str) == Some("histogram") {
                    hist_count.insert(stripped.to_string(), value);
                    continue;
                }
            }
            simple
                .entry(base_name)
                .or_default()
                .push(Sample { labels, value });
        }

        let mut families = Vec::new();
        for (name, samples) in simple {
            match types.get(&name).map(String::as_str) {
                Some("counter") => families.push(MetricFamily::Counter { name, samples }),
                _ => families.push(MetricFamily::Gauge { name, samples }),
            }
        }
        for (name, buckets) in hist_buckets {
            let sum = hist_sum.get(&name).copied().unwrap_or(0.0);
            let count = hist_count.get(&name).copied().unwrap_or(0.0);
            families.push(MetricFamily::Histogram {
                name,
                buckets,
                sum,
                count,
            });
        }
        Ok(families)
    }
}

fn parse_name_and_labels(s: &str) -> Result<(String, HashMap<String, String>), String> {
    match s.find('{') {
        None => Ok((s.to_string(), HashMap::new())),
        Some(open) => {
            let close = s
                .rfind('}')
                .ok_or_else(|| format!("unterminated label set: {s}"))?;
            let name = s[..open].to_string();
            let mut labels = HashMap::new();
            for pair in s[open + 1..close].split(',') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                if let Some(eq) = pair.find('=') {
                    let key = pair[..eq].trim().to_string();
                    let value = pair[eq + 1..].trim().trim_matches('"').to_string();
                    labels.insert(key, value);
                }
            }
            Ok((name, labels))
        }
    }
}
