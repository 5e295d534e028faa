//! Hosted-page templates
//!
//! Templates are opaque strings; the server only substitutes
//! `{{placeholder}}` markers. No templating engine, no styling opinions
//! beyond what the embedded strings carry.

use paygate_engine::form::{FormView, StatusView};

const FORM_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Payment {{payment_id}}</title>
</head>
<body>
  <h1>Pay {{amount}} {{currency}}</h1>
  <p>Order {{order_id}}</p>
  <p>{{description}}</p>
  <form method="post" action="/api/v1/paymentform/submit">
    <input type="hidden" name="PaymentId" value="{{payment_id}}">
    <label>Card number <input name="CardNumber" autocomplete="cc-number" required></label>
    <label>Expiry (MM/YY) <input name="ExpDate" autocomplete="cc-exp" required></label>
    <label>CVV <input name="Cvv" type="password" autocomplete="cc-csc" required></label>
    <label>Cardholder <input name="Holder" autocomplete="cc-name"></label>
    <button type="submit">Pay</button>
  </form>
</body>
</html>
"#;

const STATUS_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Payment {{payment_id}}</title>
</head>
<body>
  <h1>{{message}}</h1>
  <p>Payment {{payment_id}} for order {{order_id}}</p>
  <p>Amount: {{amount}} {{currency}}</p>
  <p>Status: {{status}}</p>
</body>
</html>
"#;

const ERROR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Payment error</title>
</head>
<body>
  <h1>{{message}}</h1>
</body>
</html>
"#;

/// Replace each `{{key}}` with its value; unknown markers are left as-is.
pub fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Minor units to a display amount, e.g. 150000 -> "1500.00"
pub fn display_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

pub fn render_form(view: &FormView) -> String {
    substitute(
        FORM_TEMPLATE,
        &[
            ("payment_id", view.payment_id.clone()),
            ("order_id", view.order_id.clone()),
            ("amount", display_amount(view.amount)),
            ("currency", view.currency.to_string()),
            ("description", view.description.clone().unwrap_or_default()),
        ],
    )
}

pub fn render_status(view: &StatusView) -> String {
    substitute(
        STATUS_TEMPLATE,
        &[
            ("payment_id", view.payment_id.clone()),
            ("order_id", view.order_id.clone()),
            ("amount", display_amount(view.amount)),
            ("currency", view.currency.to_string()),
            ("status", view.status.to_string()),
            ("message", view.message.clone()),
        ],
    )
}

pub fn render_error(message: &str) -> String {
    substitute(ERROR_TEMPLATE, &[("message", message.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_replaces_all_occurrences() {
        let out = substitute("{{a}} and {{a}} but not {{b}}", &[("a", "x".into())]);
        assert_eq!(out, "x and x but not {{b}}");
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(display_amount(150_000), "1500.00");
        assert_eq!(display_amount(99), "0.99");
        assert_eq!(display_amount(100), "1.00");
    }
}
