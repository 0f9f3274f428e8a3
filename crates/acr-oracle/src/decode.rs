// Wire body -> OracleReport.
//
// Accrual arrives as a JSON number. It is converted to micros without float
// arithmetic: integers exactly, fractions through their shortest round-trip
// decimal text (f64 Display never uses exponent notation).

use acr_schemas::{Micros, OracleReport, OracleStatus, OrderNumber};
use serde::Deserialize;
use serde_json::Value;

use crate::OracleError;

#[derive(Debug, Deserialize)]
struct AccrualWire {
    order: String,
    status: String,
    #[serde(default)]
    accrual: Option<Value>,
}

/// Decode a 2xx body for `expected`.
///
/// Fails when the body is malformed, names a different order, or is
/// `PROCESSED` with an accrual that is not a non-negative number with at most
/// 6 decimals. Any other status drops the accrual unread.
pub fn decode_report(expected: &OrderNumber, body: &[u8]) -> Result<OracleReport, OracleError> {
    let wire: AccrualWire = serde_json::from_slice(body)
        .map_err(|e| OracleError::Decode(format!("malformed body: {e}")))?;

    if wire.order != expected.as_str() {
        return Err(OracleError::Decode(format!(
            "body is for order '{}', requested '{}'",
            wire.order, expected
        )));
    }

    let status = OracleStatus::parse(wire.status.trim());
    let accrual = match (&status, wire.accrual) {
        (OracleStatus::Processed, Some(v)) if !v.is_null() => {
            Some(accrual_from_json(&v).map_err(OracleError::Decode)?)
        }
        _ => None,
    };

    Ok(OracleReport::new(expected.clone(), status, accrual))
}

/// JSON number -> `Micros`.
pub fn accrual_from_json(v: &Value) -> Result<Micros, String> {
    let Value::Number(n) = v else {
        return Err(format!("accrual is not a number: {v}"));
    };

    if let Some(units) = n.as_i64() {
        if units < 0 {
            return Err(format!("negative accrual: {units}"));
        }
        return Micros::from_units(units).ok_or_else(|| format!("accrual overflows: {units}"));
    }
    if n.is_u64() {
        return Err(format!("accrual overflows: {n}"));
    }

    let f = n
        .as_f64()
        .ok_or_else(|| format!("accrual not representable: {n}"))?;
    if !f.is_finite() {
        return Err(format!("accrual not finite: {n}"));
    }
    if f < 0.0 {
        return Err(format!("negative accrual: {n}"));
    }
    Micros::parse_decimal(&format!("{f}")).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n(s: &str) -> OrderNumber {
        OrderNumber::parse(s).unwrap()
    }

    #[test]
    fn integer_and_fractional_accruals_are_exact() {
        assert_eq!(accrual_from_json(&json!(500)).unwrap(), Micros::new(500_000_000));
        assert_eq!(accrual_from_json(&json!(729.98)).unwrap(), Micros::new(729_980_000));
        assert_eq!(accrual_from_json(&json!(0.000001)).unwrap(), Micros::new(1));
        assert_eq!(accrual_from_json(&json!(0)).unwrap(), Micros::ZERO);
    }

    #[test]
    fn bad_accruals_are_rejected() {
        assert!(accrual_from_json(&json!(-1)).is_err());
        assert!(accrual_from_json(&json!(-0.5)).is_err());
        assert!(accrual_from_json(&json!(0.0000001)).is_err());
        assert!(accrual_from_json(&json!("500")).is_err());
        assert!(accrual_from_json(&json!(u64::MAX)).is_err());
        assert!(accrual_from_json(&json!(i64::MAX)).is_err());
    }

    #[test]
    fn decodes_processed_body() {
        let r = decode_report(
            &n("100"),
            br#"{"order":"100","status":"PROCESSED","accrual":500}"#,
        )
        .unwrap();
        assert_eq!(r.status, OracleStatus::Processed);
        assert_eq!(r.accrual, Some(Micros::new(500_000_000)));
    }

    #[test]
    fn missing_or_null_accrual_is_none() {
        let r = decode_report(&n("7"), br#"{"order":"7","status":"PROCESSING"}"#).unwrap();
        assert_eq!(r.accrual, None);
        let r = decode_report(&n("7"), br#"{"order":"7","status":"INVALID","accrual":null}"#)
            .unwrap();
        assert_eq!(r.status, OracleStatus::Invalid);
        assert_eq!(r.accrual, None);
    }

    #[test]
    fn accrual_is_ignored_unless_processed() {
        let r = decode_report(&n("9"), br#"{"order":"9","status":"INVALID","accrual":-1}"#)
            .unwrap();
        assert_eq!(r.status, OracleStatus::Invalid);
        assert_eq!(r.accrual, None);

        let r = decode_report(
            &n("9"),
            br#"{"order":"9","status":"PROCESSING","accrual":0.0000001}"#,
        )
        .unwrap();
        assert_eq!(r.status, OracleStatus::Processing);
        assert_eq!(r.accrual, None);

        let r = decode_report(&n("9"), br#"{"order":"9","status":"REGISTERED","accrual":"x"}"#)
            .unwrap();
        assert_eq!(r.accrual, None);
    }

    #[test]
    fn processed_still_rejects_bad_accrual() {
        for body in [
            &br#"{"order":"9","status":"PROCESSED","accrual":-1}"#[..],
            &br#"{"order":"9","status":"PROCESSED","accrual":0.0000001}"#[..],
        ] {
            assert!(matches!(decode_report(&n("9"), body), Err(OracleError::Decode(_))));
        }
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let r = decode_report(&n("7"), br#"{"order":"7","status":"ON_HOLD"}"#).unwrap();
        assert_eq!(r.status, OracleStatus::Unrecognized("ON_HOLD".to_string()));
    }

    #[test]
    fn mismatched_order_is_a_decode_error() {
        let err = decode_report(&n("7"), br#"{"order":"8","status":"PROCESSED"}"#).unwrap_err();
        assert!(matches!(err, OracleError::Decode(_)), "{err}");
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            decode_report(&n("7"), b"<html>oops</html>"),
            Err(OracleError::Decode(_))
        ));
        assert!(matches!(
            decode_report(&n("7"), br#"{"status":"PROCESSED"}"#),
            Err(OracleError::Decode(_))
        ));
    }
}
