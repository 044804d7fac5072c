//! Request signature methods (RFC 5849 section 3.4).

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use ring::{constant_time, hmac};

use super::types::oauth_encode;

/// A named, stateless signing algorithm selected by the
/// `oauth_signature_method` parameter.
pub trait SignatureMethod: Send + Sync + 'static {
    /// Protocol name of the method, e.g. `HMAC-SHA1`.
    fn name(&self) -> &'static str;

    /// Computes the signature for a base string under the two secrets. The
    /// token secret is empty for the request-token step.
    fn sign(&self, base_string: &str, consumer_secret: &str, token_secret: &str) -> String;

    /// Verifies a candidate signature by recomputation. Comparison is
    /// constant-time; a mismatched length fails without branching on content.
    fn verify(
        &self,
        base_string: &str,
        consumer_secret: &str,
        token_secret: &str,
        candidate: &str,
    ) -> bool {
        let expected = self.sign(base_string, consumer_secret, token_secret);
        constant_time::verify_slices_are_equal(expected.as_bytes(), candidate.as_bytes()).is_ok()
    }
}

/// `percent_encode(consumer_secret) & percent_encode(token_secret)`, the
/// shared key shape of both methods.
fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", oauth_encode(consumer_secret), oauth_encode(token_secret))
}

/// PLAINTEXT: the signature is the signing key itself.
///
/// Offers no integrity protection on its own; it must only be trusted over a
/// transport providing confidentiality, which is a deployment concern this
/// crate does not enforce.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl SignatureMethod for Plaintext {
    fn name(&self) -> &'static str {
        "PLAINTEXT"
    }

    fn sign(&self, _base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
        signing_key(consumer_secret, token_secret)
    }
}

/// HMAC-SHA1: base64 of the HMAC-SHA1 digest of the base string under the
/// signing key.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha1;

impl SignatureMethod for HmacSha1 {
    fn name(&self) -> &'static str {
        "HMAC-SHA1"
    }

    fn sign(&self, base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
        let key = hmac::Key::new(
            hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            signing_key(consumer_secret, token_secret).as_bytes(),
        );
        let tag = hmac::sign(&key, base_string.as_bytes());
        BASE64_STANDARD.encode(tag.as_ref())
    }
}
