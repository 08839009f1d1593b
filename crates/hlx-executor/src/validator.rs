//! Order wire validator.
//!
//! Checks the final JSON payload (`action`, `nonce`, `signature`, optional
//! `vaultAddress` / `expiresAfter`) before it leaves the process. Every
//! violation is collected; the validator never stops at the first one and
//! never mutates its input.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

const GROUPINGS: [&str; 3] = ["na", "normalTpsl", "positionTpsl"];
const TIFS: [&str; 3] = ["Alo", "Ioc", "Gtc"];
const TPSLS: [&str; 2] = ["tp", "sl"];

/// One field-level defect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON path, e.g. `action.orders[0].s`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "valid");
        }
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Validate a signed-action payload.
pub fn validate(payload: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = payload.as_object() else {
        report.push("$", "payload must be an object");
        return report;
    };

    match root.get("action") {
        None => report.push("action", "missing"),
        Some(Value::Object(action)) => check_action(action, &mut report),
        Some(_) => report.push("action", "must be an object"),
    }

    match root.get("nonce") {
        None => report.push("nonce", "missing"),
        Some(v) if v.as_u64().is_some() => {}
        Some(_) => report.push("nonce", "must be an unsigned integer"),
    }

    match root.get("signature") {
        None => report.push("signature", "missing"),
        Some(Value::Object(sig)) => check_signature(sig, &mut report),
        Some(_) => report.push("signature", "must be an object"),
    }

    if let Some(vault) = root.get("vaultAddress") {
        if !vault.as_str().is_some_and(|s| is_hex(s, 20)) {
            report.push("vaultAddress", "must be a 0x-prefixed 20-byte hex address");
        }
    }

    if let Some(expires) = root.get("expiresAfter") {
        if expires.as_u64().is_none() {
            report.push("expiresAfter", "must be an unsigned integer");
        }
    }

    report
}

fn check_action(action: &Map<String, Value>, report: &mut ValidationReport) {
    match action.get("type") {
        None => report.push("action.type", "missing"),
        Some(Value::String(t)) if t == "order" => {}
        Some(Value::String(t)) => report.push("action.type", format!("unsupported action type {t:?}")),
        Some(_) => report.push("action.type", "must be a string"),
    }

    match action.get("grouping") {
        None => report.push("action.grouping", "missing"),
        Some(Value::String(g)) if GROUPINGS.contains(&g.as_str()) => {}
        Some(other) => report.push("action.grouping", format!("unknown grouping {other}")),
    }

    match action.get("orders") {
        None => report.push("action.orders", "missing"),
        Some(Value::Array(orders)) if orders.is_empty() => {
            report.push("action.orders", "must not be empty")
        }
        Some(Value::Array(orders)) => {
            for (i, order) in orders.iter().enumerate() {
                check_order(&format!("action.orders[{i}]"), order, report);
            }
        }
        Some(_) => report.push("action.orders", "must be an array"),
    }

    if let Some(builder) = action.get("builder") {
        let path = "action.builder";
        match builder.as_object() {
            None => report.push(path, "must be an object"),
            Some(b) => {
                if !b.get("b").and_then(Value::as_str).is_some_and(|s| is_hex(s, 20)) {
                    report.push(format!("{path}.b"), "must be a 0x-prefixed 20-byte hex address");
                }
                if b.get("f").and_then(Value::as_u64).is_none() {
                    report.push(format!("{path}.f"), "must be an unsigned integer");
                }
            }
        }
    }
}

fn check_order(path: &str, order: &Value, report: &mut ValidationReport) {
    let Some(order) = order.as_object() else {
        report.push(path, "order must be an object");
        return;
    };

    match order.get("a") {
        None => report.push(format!("{path}.a"), "missing asset index"),
        Some(v) if v.as_u64().is_some_and(|a| a <= u32::MAX as u64) => {}
        Some(_) => report.push(format!("{path}.a"), "asset index must be a non-negative integer"),
    }

    check_bool(path, "b", order, report);
    check_decimal_string(path, "p", order, report);
    check_decimal_string(path, "s", order, report);
    check_bool(path, "r", order, report);

    match order.get("t") {
        None => report.push(format!("{path}.t"), "missing order type"),
        Some(t) => check_order_type(&format!("{path}.t"), t, report),
    }

    if let Some(cloid) = order.get("c") {
        if !cloid.as_str().is_some_and(|s| is_hex(s, 16)) {
            report.push(format!("{path}.c"), "cloid must be 0x followed by 32 hex characters");
        }
    }
}

fn check_order_type(path: &str, t: &Value, report: &mut ValidationReport) {
    let Some(t) = t.as_object() else {
        report.push(path, "order type must be an object");
        return;
    };

    match (t.get("limit"), t.get("trigger")) {
        (Some(limit), None) => {
            let tif = limit.get("tif").and_then(Value::as_str);
            if !tif.is_some_and(|tif| TIFS.contains(&tif)) {
                report.push(format!("{path}.limit.tif"), "must be one of Alo, Ioc, Gtc");
            }
        }
        (None, Some(trigger)) => {
            let Some(trigger) = trigger.as_object() else {
                report.push(format!("{path}.trigger"), "must be an object");
                return;
            };
            let trigger_path = format!("{path}.trigger");
            check_bool(&trigger_path, "isMarket", trigger, report);
            check_decimal_string(&trigger_path, "triggerPx", trigger, report);
            let tpsl = trigger.get("tpsl").and_then(Value::as_str);
            if !tpsl.is_some_and(|v| TPSLS.contains(&v)) {
                report.push(format!("{trigger_path}.tpsl"), "must be tp or sl");
            }
        }
        (Some(_), Some(_)) => report.push(path, "order type must be either limit or trigger, not both"),
        (None, None) => report.push(path, "order type discriminator missing"),
    }
}

fn check_signature(sig: &Map<String, Value>, report: &mut ValidationReport) {
    for field in ["r", "s"] {
        match sig.get(field) {
            None => report.push(format!("signature.{field}"), "missing"),
            Some(v) if v.as_str().is_some_and(|s| is_hex(s, 32)) => {}
            Some(_) => report.push(
                format!("signature.{field}"),
                "must be a 0x-prefixed 32-byte hex string",
            ),
        }
    }
    match sig.get("v") {
        None => report.push("signature.v", "missing"),
        Some(v) if matches!(v.as_u64(), Some(27 | 28)) => {}
        Some(_) => report.push("signature.v", "recovery id must be the integer 27 or 28"),
    }
}

fn check_bool(path: &str, field: &str, obj: &Map<String, Value>, report: &mut ValidationReport) {
    match obj.get(field) {
        None => report.push(format!("{path}.{field}"), "missing"),
        Some(Value::Bool(_)) => {}
        Some(_) => report.push(format!("{path}.{field}"), "must be a boolean"),
    }
}

fn check_decimal_string(
    path: &str,
    field: &str,
    obj: &Map<String, Value>,
    report: &mut ValidationReport,
) {
    match obj.get(field) {
        None => report.push(format!("{path}.{field}"), "missing"),
        Some(Value::String(s)) => match Decimal::from_str(s) {
            Ok(d) if d > Decimal::ZERO => {}
            Ok(_) => report.push(format!("{path}.{field}"), "must be positive"),
            Err(_) => report.push(format!("{path}.{field}"), format!("{s:?} is not a decimal")),
        },
        Some(_) => report.push(
            format!("{path}.{field}"),
            "must be a decimal string, not a number",
        ),
    }
}

/// `0x` followed by exactly `bytes * 2` hex digits.
fn is_hex(s: &str, bytes: usize) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|h| h.len() == bytes * 2 && h.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "action": {
                "type": "order",
                "orders": [{
                    "a": 4,
                    "b": true,
                    "p": "1670.1",
                    "s": "0.0147",
                    "r": false,
                    "t": {"limit": {"tif": "Ioc"}}
                }],
                "grouping": "na"
            },
            "nonce": 1677777606040u64,
            "signature": {
                "r": format!("0x{}", "ab".repeat(32)),
                "s": format!("0x{}", "cd".repeat(32)),
                "v": 27
            }
        })
    }

    fn paths(report: &ValidationReport) -> Vec<&str> {
        report.violations().iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_valid_payload() {
        let report = validate(&valid_payload());
        assert!(report.is_valid(), "{report}");
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_collects_all_violations() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("nonce");
        payload["action"]["orders"][0]["s"] = json!(0.0147);

        let report = validate(&payload);
        assert!(!report.is_valid());
        assert_eq!(paths(&report), ["action.orders[0].s", "nonce"]);
        let messages: Vec<_> = report.violations().iter().map(|v| &v.message).collect();
        assert_ne!(messages[0], messages[1]);
    }

    #[test]
    fn test_missing_top_level_fields() {
        let report = validate(&json!({}));
        assert_eq!(paths(&report), ["action", "nonce", "signature"]);
        assert!(!validate(&json!([1, 2])).is_valid());
    }

    #[test]
    fn test_order_field_types() {
        let mut payload = valid_payload();
        payload["action"]["orders"][0] = json!({
            "a": "4",
            "b": 1,
            "p": "abc",
            "s": "-1",
            "r": "false",
            "c": "0x1234"
        });
        let report = validate(&payload);
        assert_eq!(
            paths(&report),
            [
                "action.orders[0].a",
                "action.orders[0].b",
                "action.orders[0].p",
                "action.orders[0].s",
                "action.orders[0].r",
                "action.orders[0].t",
                "action.orders[0].c",
            ]
        );
    }

    #[test]
    fn test_order_type_contents() {
        let mut payload = valid_payload();
        payload["action"]["orders"][0]["t"] = json!({"limit": {"tif": "FOK"}});
        assert_eq!(paths(&validate(&payload)), ["action.orders[0].t.limit.tif"]);

        payload["action"]["orders"][0]["t"] =
            json!({"trigger": {"isMarket": true, "triggerPx": 2000, "tpsl": "stop"}});
        assert_eq!(
            paths(&validate(&payload)),
            [
                "action.orders[0].t.trigger.triggerPx",
                "action.orders[0].t.trigger.tpsl"
            ]
        );

        payload["action"]["orders"][0]["t"] =
            json!({"trigger": {"isMarket": false, "triggerPx": "2000.0", "tpsl": "tp"}});
        assert!(validate(&payload).is_valid());
    }

    #[test]
    fn test_signature_checks() {
        let mut payload = valid_payload();
        payload["signature"] = json!({"r": "0x12", "v": "27"});
        assert_eq!(
            paths(&validate(&payload)),
            ["signature.r", "signature.s", "signature.v"]
        );
    }

    #[test]
    fn test_optional_envelope_fields() {
        let mut payload = valid_payload();
        payload["vaultAddress"] = json!("0x4242424242424242424242424242424242424242");
        payload["expiresAfter"] = json!(1677777666040u64);
        assert!(validate(&payload).is_valid());

        payload["vaultAddress"] = json!("0x42");
        payload["expiresAfter"] = json!(-5);
        assert_eq!(paths(&validate(&payload)), ["vaultAddress", "expiresAfter"]);
    }

    #[test]
    fn test_action_shape() {
        let mut payload = valid_payload();
        payload["action"]["grouping"] = json!("none");
        payload["action"]["orders"] = json!([]);
        payload["action"]["type"] = json!("cancel");
        let report = validate(&payload);
        assert_eq!(
            paths(&report),
            ["action.type", "action.grouping", "action.orders"]
        );
    }

    #[test]
    fn test_input_is_untouched() {
        let payload = valid_payload();
        let before = payload.clone();
        let _ = validate(&payload);
        assert_eq!(payload, before);
    }
}
