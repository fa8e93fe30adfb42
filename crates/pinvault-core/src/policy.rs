//! PIN policy: validation rules and secure PIN generation.
//!
//! Validation collects every violated rule rather than stopping at the
//! first, so the caller can report the complete list to the user.

use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;

/// Minimum PIN length in digits.
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum PIN length in digits.
pub const MAX_PIN_LENGTH: usize = 20;

/// Length of PINs produced by [`generate_secure_pin`].
const GENERATED_PIN_LENGTH: usize = 6;

/// Outcome of validating a candidate PIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate a candidate PIN against the policy.
///
/// Rules: length 4-20, digits only, and not a weak pattern (all digits
/// identical, or a 4-digit ascending/descending run anchored at the start,
/// `0123`..`6789` and `9876`..`3210`).
pub fn validate(pin: &str) -> PinValidation {
    let mut errors = Vec::new();

    if pin.len() < MIN_PIN_LENGTH || pin.len() > MAX_PIN_LENGTH {
        errors.push(format!(
            "PIN must be between {} and {} digits",
            MIN_PIN_LENGTH, MAX_PIN_LENGTH
        ));
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        errors.push("PIN must contain only digits".to_string());
    }

    if is_weak(pin) {
        errors.push("PIN is too predictable".to_string());
    }

    PinValidation {
        valid: errors.is_empty(),
        errors,
    }
}

fn is_weak(pin: &str) -> bool {
    let bytes = pin.as_bytes();
    if bytes.is_empty() {
        return false;
    }

    if bytes.iter().all(|b| *b == bytes[0]) {
        return true;
    }

    // Sequential runs only count when anchored at the start of the PIN.
    if bytes.len() >= 4 && bytes[..4].iter().all(|b| b.is_ascii_digit()) {
        let run = &bytes[..4];
        let ascending = run.windows(2).all(|w| w[1] == w[0] + 1);
        let descending = run.windows(2).all(|w| w[0] == w[1] + 1);
        if ascending || descending {
            return true;
        }
    }

    false
}

/// Generate a policy-satisfying 6-digit PIN.
///
/// Each digit is drawn uniformly from a cryptographically secure source.
/// A draw that happens to match a weak pattern is discarded and regenerated
/// from scratch. The loop has no explicit bound: it would only fail to
/// terminate if the policy rejected essentially the whole 6-digit space,
/// which the weak-pattern set does not come close to.
pub fn generate_secure_pin() -> String {
    let mut rng = OsRng;
    loop {
        let pin: String = (0..GENERATED_PIN_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        if !is_weak(&pin) {
            return pin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pins() {
        assert!(validate("1357").valid);
        assert!(validate("4821").valid);
        assert!(validate("002486").valid);
        assert!(validate("10293847560192837465").valid); // 20 digits, max length
    }

    #[test]
    fn test_length_rule() {
        let result = validate("123");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("between")));

        let result = validate("123456789012345678901"); // 21 digits
        assert!(!result.valid);
    }

    #[test]
    fn test_digits_only_rule() {
        let result = validate("12a4");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("only digits")));
    }

    #[test]
    fn test_weak_patterns_rejected() {
        for pin in ["0000", "1111", "9999", "1234", "0123", "6789", "9876", "3210"] {
            let result = validate(pin);
            assert!(!result.valid, "{} should be weak", pin);
            assert!(
                result.errors.iter().any(|e| e.contains("predictable")),
                "{} should report a weak-pattern error",
                pin
            );
        }
    }

    #[test]
    fn test_run_must_be_anchored_at_start() {
        // A sequential run later in the PIN does not trigger the rule.
        assert!(validate("9123").valid);
        assert!(validate("51234").valid);
    }

    #[test]
    fn test_all_violations_collected() {
        // Too short AND non-digit: both errors reported.
        let result = validate("1a");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_generated_pins_satisfy_policy() {
        for _ in 0..100 {
            let pin = generate_secure_pin();
            assert_eq!(pin.len(), 6);
            let result = validate(&pin);
            assert!(result.valid, "generated PIN {} failed policy", pin);
        }
    }

    #[test]
    fn test_generated_pins_vary() {
        let pins: std::collections::HashSet<String> =
            (0..20).map(|_| generate_secure_pin()).collect();
        assert!(pins.len() > 1);
    }
}
