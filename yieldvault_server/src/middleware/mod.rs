mod hmac;

pub use hmac::{WebhookHmacFactory, SIGNATURE_HEADER};
