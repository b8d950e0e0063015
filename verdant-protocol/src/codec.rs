/**
 * COMMAND CODEC - Text protocol spoken between the boards
 *
 * ROLE: Turns `CMD:<clause>;<clause>;...` lines into typed directives and
 * back, and renders the sensor report document.
 *
 * GRAMMAR:
 * - `LED,<red|green|blue>,<BLINK|mode>`  -> SetIndicator
 * - `BUZZER,<seconds>`                   -> Buzz (non-numeric seconds -> 0)
 * - `WPUMP,<ON|OFF>` / `FPUMP,<ON|OFF>`  -> SetActuator (90% when ON)
 * - `WPUMP,SPEED,<n>` / `FPUMP,SPEED,<n>` -> SetIntensity
 *
 * A bad clause is recorded in `CommandBatch::skipped` and decoding moves on
 * to the next `;`. Text after the last `;` is an incomplete clause and is
 * ignored.
 */

use crate::models::{ActuatorId, Color, CommandBatch, Directive, Reading};
use crate::report::SensorReport;

/// Marker every command line starts with.
pub const COMMAND_PREFIX: &str = "CMD:";

/// Why one clause was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClauseError {
    #[error("unrecognized keyword in clause '{0}'")]
    UnrecognizedKeyword(String),
    #[error("malformed clause '{clause}': {reason}")]
    MalformedClause { clause: String, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{0} has no wire keyword")]
    NotWireable(ActuatorId),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Decodes one protocol line. Input without the prefix yields an empty batch.
pub fn decode(text: &str) -> CommandBatch {
    let mut batch = CommandBatch::default();
    let Some(mut rest) = text.trim().strip_prefix(COMMAND_PREFIX) else {
        return batch;
    };

    while let Some(end) = rest.find(';') {
        let clause = rest[..end].trim();
        rest = &rest[end + 1..];
        if clause.is_empty() {
            continue;
        }
        match decode_clause(clause) {
            Ok(directive) => batch.directives.push(directive),
            Err(e) => batch.skipped.push(e),
        }
    }

    batch
}

fn decode_clause(clause: &str) -> Result<Directive, ClauseError> {
    let fields: Vec<&str> = clause.split(',').map(str::trim).collect();

    match fields.as_slice() {
        ["LED", color, mode] => {
            let color = Color::parse(color).ok_or_else(|| malformed(clause, "unknown color"))?;
            Ok(Directive::SetIndicator { color, blinking: *mode == "BLINK" })
        }
        ["LED", ..] => Err(malformed(clause, "expected LED,<color>,<mode>")),

        ["BUZZER", seconds] => {
            let seconds = parse_permissive(seconds).clamp(0, u32::MAX as i64) as u32;
            Ok(Directive::Buzz { seconds })
        }
        ["BUZZER", ..] => Err(malformed(clause, "expected BUZZER,<seconds>")),

        [keyword @ ("WPUMP" | "FPUMP"), "SPEED", value] => Ok(Directive::SetIntensity {
            actuator: pump_for(keyword),
            intensity: parse_permissive(value).clamp(0, 100) as u8,
        }),
        ["WPUMP" | "FPUMP", "SPEED", ..] => Err(malformed(clause, "expected <PUMP>,SPEED,<n>")),
        [keyword @ ("WPUMP" | "FPUMP"), state] => {
            Ok(Directive::switch(pump_for(keyword), *state == "ON"))
        }
        ["WPUMP" | "FPUMP", ..] => Err(malformed(clause, "expected <PUMP>,<ON|OFF>")),

        _ => Err(ClauseError::UnrecognizedKeyword(clause.to_string())),
    }
}

fn malformed(clause: &str, reason: &'static str) -> ClauseError {
    ClauseError::MalformedClause { clause: clause.to_string(), reason }
}

fn pump_for(keyword: &str) -> ActuatorId {
    if keyword == "WPUMP" {
        ActuatorId::WaterPump
    } else {
        ActuatorId::FertilizerPump
    }
}

/// Leading-integer parse: optional sign then digits, anything else stops it.
/// "3" -> 3, "12s" -> 12, "abc" -> 0.
fn parse_permissive(text: &str) -> i64 {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative { -value } else { value }
}

fn pump_keyword(actuator: ActuatorId) -> Result<&'static str, CodecError> {
    match actuator {
        ActuatorId::WaterPump => Ok("WPUMP"),
        ActuatorId::FertilizerPump => Ok("FPUMP"),
        other => Err(CodecError::NotWireable(other)),
    }
}

/// Renders one directive as a clause, without the prefix or terminator.
pub fn encode_directive(directive: &Directive) -> Result<String, CodecError> {
    let clause = match *directive {
        Directive::SetActuator { actuator, on, .. } => {
            format!("{},{}", pump_keyword(actuator)?, if on { "ON" } else { "OFF" })
        }
        Directive::SetIntensity { actuator, intensity } => {
            format!("{},SPEED,{}", pump_keyword(actuator)?, intensity)
        }
        Directive::SetIndicator { color, blinking } => {
            format!("LED,{},{}", color, if blinking { "BLINK" } else { "ON" })
        }
        Directive::Buzz { seconds } => format!("BUZZER,{}", seconds),
    };
    Ok(clause)
}

/// Renders a full command line: `CMD:` followed by `;`-terminated clauses.
pub fn encode_batch(directives: &[Directive]) -> Result<String, CodecError> {
    let mut line = String::from(COMMAND_PREFIX);
    for directive in directives {
        line.push_str(&encode_directive(directive)?);
        line.push(';');
    }
    Ok(line)
}

/// Renders the sensor report document for the current reading set.
pub fn encode_report(readings: &[Reading]) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&SensorReport::from_readings(readings))?)
}
