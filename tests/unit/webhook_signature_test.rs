// Webhook authentication: HMAC-SHA-256 over the exact raw body. The MAC is
// computed on received bytes, never on re-serialised JSON, so whitespace and
// field order are load-bearing.

use meterbill::modules::payments::services::gateway_client::{sign_body, verify_signature};

const SECRET: &[u8] = b"whsec_4f1c2a9b";

#[test]
fn test_valid_signature_accepts() {
    let body = br#"{"event":"payment.captured","payload":{"payment":{"id":"pay_1","order_id":"order_1","status":"captured","method":"upi","amount":11800}}}"#;
    let signature = sign_body(SECRET, body);
    assert!(verify_signature(SECRET, body, &signature).is_ok());
}

#[test]
fn test_signature_covers_exact_bytes() {
    // Same JSON value, different spacing: the MAC must not transfer
    let compact = br#"{"event":"payment.captured","payload":{}}"#;
    let spaced = br#"{ "event": "payment.captured", "payload": {} }"#;

    let signature = sign_body(SECRET, compact);
    assert!(verify_signature(SECRET, compact, &signature).is_ok());
    assert!(verify_signature(SECRET, spaced, &signature).is_err());
}

#[test]
fn test_tampered_body_rejected() {
    let body = br#"{"event":"payment.captured","payload":{"amount":11800}}"#;
    let tampered = br#"{"event":"payment.captured","payload":{"amount":99999}}"#;
    let signature = sign_body(SECRET, body);
    assert!(verify_signature(SECRET, tampered, &signature).is_err());
}

#[test]
fn test_wrong_secret_rejected() {
    let body = br#"{"event":"refund.processed"}"#;
    let signature = sign_body(b"whsec_other", body);
    assert!(verify_signature(SECRET, body, &signature).is_err());
}

#[test]
fn test_malformed_signature_rejected() {
    let body = br#"{"event":"payment.captured"}"#;
    assert!(verify_signature(SECRET, body, "zz-not-hex").is_err());
    assert!(verify_signature(SECRET, body, "").is_err());
    // Truncated but valid hex still fails the MAC comparison
    let full = sign_body(SECRET, body);
    assert!(verify_signature(SECRET, body, &full[..32]).is_err());
}

#[test]
fn test_signature_whitespace_is_trimmed() {
    let body = br#"{"event":"payment.authorized"}"#;
    let signature = format!("  {}\n", sign_body(SECRET, body));
    assert!(verify_signature(SECRET, body, &signature).is_ok());
}
