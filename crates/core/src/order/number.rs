//! Order number validation (Luhn checksum).

/// Returns true if `number` is a non-empty string of ASCII digits passing the Luhn check.
pub fn is_valid_order_number(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    let mut double = false;

    for c in number.chars().rev() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };

        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }

        sum += digit;
        double = !double;
    }

    sum % 10 == 0
}
