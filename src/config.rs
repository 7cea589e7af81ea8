//! Typed helpers for the dictionary-based configuration and status interface.
//!
//! Neurons and synapses expose their parameters and live state as a
//! `serde_json` map. Setting follows the update-in-place idiom: a key that is
//! absent leaves the target untouched, a key with the wrong type is a
//! configuration error. Callers are expected to stage updates on a temporary
//! copy and commit only after validation, so a rejected dictionary never
//! partially mutates state.

use serde_json::{Map, Value};

use crate::error::SNNError;

/// A dictionary mapping parameter names to values.
pub type StatusDict = Map<String, Value>;

/// Insert a value into a status dictionary.
pub fn def<T: Into<Value>>(d: &mut StatusDict, key: &str, value: T) {
    d.insert(key.to_string(), value.into());
}

/// Update a float from the dictionary, if the key is present.
pub fn update_f64(d: &StatusDict, key: &str, target: &mut f64) -> Result<(), SNNError> {
    if let Some(value) = d.get(key) {
        *target = value.as_f64().ok_or(SNNError::TypeMismatch {
            key: key.to_string(),
        })?;
    }
    Ok(())
}

/// Update a boolean from the dictionary, if the key is present.
pub fn update_bool(d: &StatusDict, key: &str, target: &mut bool) -> Result<(), SNNError> {
    if let Some(value) = d.get(key) {
        *target = value.as_bool().ok_or(SNNError::TypeMismatch {
            key: key.to_string(),
        })?;
    }
    Ok(())
}

/// Update an unsigned integer from the dictionary, if the key is present.
pub fn update_u64(d: &StatusDict, key: &str, target: &mut u64) -> Result<(), SNNError> {
    if let Some(value) = d.get(key) {
        *target = value.as_u64().ok_or(SNNError::TypeMismatch {
            key: key.to_string(),
        })?;
    }
    Ok(())
}

/// Update a float vector from the dictionary, if the key is present.
pub fn update_f64_vec(d: &StatusDict, key: &str, target: &mut Vec<f64>) -> Result<(), SNNError> {
    if let Some(value) = d.get(key) {
        let array = value.as_array().ok_or(SNNError::TypeMismatch {
            key: key.to_string(),
        })?;
        let mut values = Vec::with_capacity(array.len());
        for element in array {
            values.push(element.as_f64().ok_or(SNNError::TypeMismatch {
                key: key.to_string(),
            })?);
        }
        *target = values;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_missing_key_is_ignored() {
        let d = StatusDict::new();
        let mut x = 1.5;
        assert_eq!(update_f64(&d, "tau_r", &mut x), Ok(()));
        assert_eq!(x, 1.5);
    }

    #[test]
    fn test_update_f64() {
        let mut d = StatusDict::new();
        def(&mut d, "tau_r", 2.5);
        let mut x = 0.0;
        assert_eq!(update_f64(&d, "tau_r", &mut x), Ok(()));
        assert_eq!(x, 2.5);
    }

    #[test]
    fn test_update_type_mismatch() {
        let mut d = StatusDict::new();
        def(&mut d, "with_reset", "yes");
        let mut flag = false;
        assert_eq!(
            update_bool(&d, "with_reset", &mut flag),
            Err(SNNError::TypeMismatch {
                key: "with_reset".to_string()
            })
        );
        assert!(!flag);
    }

    #[test]
    fn test_update_f64_vec() {
        let mut d = StatusDict::new();
        d.insert("tau_sfa".to_string(), json!([30.0, 300.0]));
        let mut taus = vec![];
        assert_eq!(update_f64_vec(&d, "tau_sfa", &mut taus), Ok(()));
        assert_eq!(taus, vec![30.0, 300.0]);

        d.insert("tau_sfa".to_string(), json!([30.0, "oops"]));
        assert_eq!(
            update_f64_vec(&d, "tau_sfa", &mut taus),
            Err(SNNError::TypeMismatch {
                key: "tau_sfa".to_string()
            })
        );
        assert_eq!(taus, vec![30.0, 300.0]);
    }
}
