use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of the hex-encoded portion of a sha256 digest.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Takes a string and returns a validated [`Digest`]. When parsing fails,
/// returns a [`ParseDigestError`] explaining what went wrong.
///
/// The accepted grammar is `sha256:` followed by exactly 64 lowercase hex
/// characters. Uppercase hex is rejected.
pub fn parse_digest(input: &str) -> Result<Digest, ParseDigestError> {
    if input.is_empty() {
        return Err(ParseDigestError::EmptyInput);
    }

    let (algorithm, encoded) = input.split_once(':').ok_or(ParseDigestError::MissingColon)?;

    if algorithm != "sha256" {
        return Err(ParseDigestError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    if encoded.len() != SHA256_HEX_LENGTH {
        return Err(ParseDigestError::BadLength(encoded.len()));
    }

    for (pos, ch) in encoded.char_indices() {
        if !matches!(ch, 'a'..='f' | '0'..='9') {
            return Err(ParseDigestError::UnexpectedChar { pos, ch });
        }
    }

    Ok(Digest(encoded.to_owned()))
}

/// A validated sha256 content digest. Displays as `sha256:<hex>`, which is
/// also the on-disk filename of the blob it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(pub(crate) String);

impl Digest {
    /// The hex-encoded portion without the algorithm prefix.
    pub fn encoded(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

impl std::str::FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_digest(s)
    }
}

/// Error describing what exactly went wrong when parsing a digest string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseDigestError {
    #[error("input is empty")]
    EmptyInput,

    #[error("missing ':' after algorithm")]
    MissingColon,

    #[error("unsupported digest algorithm \"{0}\"")]
    UnsupportedAlgorithm(String),

    #[error("encoded portion must be {SHA256_HEX_LENGTH} characters, got {0}")]
    BadLength(usize),

    #[error("unexpected character '{ch}' at position {pos} in encoded portion")]
    UnexpectedChar { pos: usize, ch: char },
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_digest(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn ok(s: &str) {
        assert!(parse_digest(s).is_ok(), "expected Ok for {s}");
    }

    fn err(s: &str) {
        assert!(parse_digest(s).is_err(), "expected Err for {s}");
    }

    #[test]
    fn valid_digests() {
        ok(EMPTY_SHA256);
        ok("sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }

    #[test]
    fn invalid_algorithm() {
        err(""); // empty
        err("sha256"); // no colon
        err(":abcd"); // missing algorithm
        err(
            "sha512:cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e",
        );
        err("multihash+base58:QmRZxt2b1FVZPNqd8hsiykDL3TdBDeTSPX9Kv46HmX4Gx8");
    }

    #[test]
    fn invalid_length() {
        err("sha256:");
        err("sha256:abc");
        err("sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b8555");
    }

    #[test]
    fn invalid_hex_chars() {
        // 'g' is not hex
        err("sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85g");

        // uppercase hex must not be used
        err("sha256:E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855");
    }

    #[test]
    fn error_positions() {
        let result = parse_digest("sha256:ze3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85");
        assert_eq!(result.unwrap_err(), ParseDigestError::UnexpectedChar { pos: 0, ch: 'z' });
    }

    #[test]
    fn display_roundtrip() {
        let digest = parse_digest(EMPTY_SHA256).expect("digest string must be valid");
        assert_eq!(digest.to_string(), EMPTY_SHA256);
        assert_eq!(digest.encoded().len(), SHA256_HEX_LENGTH);
    }

    #[test]
    fn serialization_roundtrip() {
        let digest = parse_digest(EMPTY_SHA256).expect("digest string must be valid");
        let json = serde_json::to_string(&digest).expect("should serialize to JSON");
        assert_eq!(json, format!("\"{EMPTY_SHA256}\""));

        let deserialized: Digest = serde_json::from_str(&json).expect("should deserialize from JSON");
        assert_eq!(digest, deserialized);
    }

    #[test]
    fn deserialization_rejects_invalid() {
        let result: Result<Digest, _> = serde_json::from_str("\"sha256:nope\"");
        assert!(result.is_err());
    }
}
