//! Base64 handling for query parameters and bodies.
//!
//! Query parameters arrive in whatever flavour the caller's encoder produced:
//! padded or not, standard or URL-safe alphabet, and sometimes with `+`
//! already turned into a space by form decoding. Decoding accepts all of
//! these; encoding always emits padded standard base64.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{DecodeError, Engine};

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decode base64 text, accepting either alphabet and optional padding.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let normalized = input
        .trim_matches(|c: char| c.is_ascii_whitespace() && c != ' ')
        .replace(' ', "+");
    match STANDARD_LENIENT.decode(&normalized) {
        Ok(bytes) => Ok(bytes),
        Err(standard_err) => URL_SAFE_LENIENT
            .decode(&normalized)
            .map_err(|_| standard_err),
    }
}

/// Encode bytes as padded standard base64.
pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}
