/*!
Test harness for the Verdant boards

Bundles the stubs a board test needs:
- a recording link and a scripted bus sharing state with the test
- a fixed clock (`at(seconds)`) so event timestamps are deterministic
- reading builders and assertions on the lines sent over the link
*/

use crate::bus_stub::ScriptedBus;
use crate::link_stub::RecordingLink;
use anyhow::Result;
use serde_json::Value;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use verdant_protocol::{decode, Directive, Quantity, Reading};

/// Reference instant all harness clocks count from.
pub const EPOCH: OffsetDateTime = datetime!(2024-06-01 06:00:00 UTC);

/// `EPOCH + seconds`.
pub fn at(seconds: i64) -> OffsetDateTime {
    EPOCH + Duration::seconds(seconds)
}

/// Local readings from `(quantity, value)` pairs.
pub fn readings(values: &[(Quantity, f64)]) -> Vec<Reading> {
    values.iter().map(|(q, v)| Reading::local(*q, *v)).collect()
}

pub struct TestHarness {
    pub link: RecordingLink,
    pub bus: ScriptedBus,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    prefix: String,
    expected_count: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok();

        Self {
            link: RecordingLink::new(),
            bus: ScriptedBus::new(),
            expectations: Vec::new(),
        }
    }

    /// Expects exactly `count` sent lines starting with `prefix`.
    pub fn expect_lines(&mut self, prefix: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            prefix: prefix.to_string(),
            expected_count: count,
        });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self.link.sent_matching(&expectation.prefix).len();
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for '{}': expected {} lines, got {}",
                    expectation.prefix,
                    expectation.expected_count,
                    actual
                );
            }
            log::info!("✅ '{}': {} lines as expected", expectation.prefix, actual);
        }
        Ok(())
    }

    /// Last report document sent over the link.
    pub fn last_report(&self) -> Result<Option<Value>> {
        match self.link.sent_matching("{").last() {
            Some(line) => Ok(Some(serde_json::from_str(line)?)),
            None => Ok(None),
        }
    }

    /// Directives of every command line sent over the link, in order.
    pub fn sent_directives(&self) -> Vec<Directive> {
        self.link
            .sent_matching("CMD:")
            .iter()
            .flat_map(|line| decode(line).directives)
            .collect()
    }

    /// Asserts a field of the last report, e.g. `("moisture", json!(15.0))`.
    pub fn assert_report_field(&self, field: &str, expected: &Value) -> Result<()> {
        let Some(report) = self.last_report()? else {
            anyhow::bail!("No report sent yet");
        };
        match report.get(field) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!("Field '{}' mismatch: expected {:?}, got {:?}", field, expected, actual),
            None => anyhow::bail!("Field '{}' not found in last report", field),
        }
    }

    pub fn reset(&mut self) {
        self.link.clear();
        self.expectations.clear();
        log::info!("🧹 Test harness reset");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
