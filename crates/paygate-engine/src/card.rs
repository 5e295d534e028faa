//! Card input validation
//!
//! Runs on the hosted-form POST before anything touches the adapter.
//! Raw card data never reaches a log line or the store; the only thing
//! persisted downstream is the adapter's masked PAN.

use chrono::{DateTime, Datelike, Utc};

use paygate_bank::CardDetails;
use paygate_types::{GatewayError, GatewayResult};

/// Raw hosted-form fields
#[derive(Clone)]
pub struct CardForm {
    pub card_number: String,
    /// `MM/YY`
    pub exp_date: String,
    pub cvv: String,
    pub holder: Option<String>,
}

pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        let d = if double {
            let doubled = d * 2;
            if doubled > 9 {
                doubled - 9
            } else {
                doubled
            }
        } else {
            d
        };
        sum += d;
        double = !double;
    }
    !digits.is_empty() && sum % 10 == 0
}

/// Validate the form and produce the adapter input.
pub fn validate_card(form: &CardForm, now: DateTime<Utc>) -> GatewayResult<CardDetails> {
    let digits: String = form
        .card_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::validation("card number must be numeric"));
    }
    if digits.len() < 13 || digits.len() > 19 {
        return Err(GatewayError::validation(
            "card number must be 13-19 digits",
        ));
    }
    if !luhn_valid(&digits) {
        return Err(GatewayError::validation("card number failed checksum"));
    }

    let (exp_month, exp_year) = parse_expiry(&form.exp_date)?;
    if (exp_year, exp_month) < (now.year() as u32, now.month()) {
        return Err(GatewayError::validation("card has expired"));
    }

    if form.cvv.len() < 3 || form.cvv.len() > 4 || !form.cvv.chars().all(|c| c.is_ascii_digit())
    {
        return Err(GatewayError::validation("CVV must be 3-4 digits"));
    }

    Ok(CardDetails {
        pan: digits,
        exp_month,
        exp_year,
        cvv: form.cvv.clone(),
        holder: form.holder.clone(),
    })
}

fn parse_expiry(exp: &str) -> GatewayResult<(u32, u32)> {
    let (month, year) = exp
        .split_once('/')
        .ok_or_else(|| GatewayError::validation("expiry must be MM/YY"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| GatewayError::validation("expiry must be MM/YY"))?;
    let year: u32 = year
        .trim()
        .parse()
        .map_err(|_| GatewayError::validation("expiry must be MM/YY"))?;
    if !(1..=12).contains(&month) {
        return Err(GatewayError::validation("expiry month out of range"));
    }
    if year > 99 {
        return Err(GatewayError::validation("expiry year must be two digits"));
    }
    Ok((month, 2000 + year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn form(pan: &str, exp: &str, cvv: &str) -> CardForm {
        CardForm {
            card_number: pan.into(),
            exp_date: exp.into(),
            cvv: cvv.into(),
            holder: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_luhn_valid_lengths() {
        // 13, 16 and 19 digit Luhn-valid numbers.
        for pan in ["4222222222222", "4111 1111 1111 1111", "4000000000000000006"] {
            assert!(validate_card(&form(pan, "12/29", "123"), now()).is_ok(), "{pan}");
        }
    }

    #[test]
    fn rejects_off_by_one_checksum() {
        assert!(validate_card(&form("4111111111111112", "12/29", "123"), now()).is_err());
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(validate_card(&form("411111111111", "12/29", "123"), now()).is_err());
        assert!(validate_card(&form(&"4".repeat(20), "12/29", "123"), now()).is_err());
    }

    #[test]
    fn expiry_boundaries() {
        // Current month is still valid; last month is not.
        assert!(validate_card(&form("4111111111111111", "06/26", "123"), now()).is_ok());
        assert!(validate_card(&form("4111111111111111", "05/26", "123"), now()).is_err());
        assert!(validate_card(&form("4111111111111111", "13/29", "123"), now()).is_err());
        assert!(validate_card(&form("4111111111111111", "1229", "123"), now()).is_err());
    }

    #[test]
    fn cvv_rules() {
        assert!(validate_card(&form("4111111111111111", "12/29", "12"), now()).is_err());
        assert!(validate_card(&form("4111111111111111", "12/29", "1234"), now()).is_ok());
        assert!(validate_card(&form("4111111111111111", "12/29", "12a"), now()).is_err());
    }
}
