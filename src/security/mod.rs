pub mod signing;
pub mod url_validation;

pub use signing::{SignedRequest, sign, verify};
pub use url_validation::{UrlRules, is_private_ip, validate_webhook_url};
