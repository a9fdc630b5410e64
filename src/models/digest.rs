//! E-mail digest models

/// A composed digest ready for delivery
#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}
