//! Repository name and reference grammars, and extraction of the
//! repository name from a request path.

use std::sync::LazyLock;

use regex_lite::Regex;
use thiserror::Error;

/// Minimum number of slash-separated components in a repository name.
pub const NAME_MIN_COMPONENTS: usize = 2;

/// Path components that terminate a repository name inside a request URI
/// and are therefore disallowed as name components.
pub const RESERVED_COMPONENTS: [&str; 4] = ["blobs", "manifests", "tags", "referrers"];

#[derive(Error, Debug, PartialEq)]
pub enum NameError {
    #[error("path does not start with /v2/")]
    MissingApiPrefix,
    #[error("repository name must have at least {NAME_MIN_COMPONENTS} components")]
    MissingComponents,
    #[error("repository name component must match \"[a-z0-9]+(?:[._-][a-z0-9]+)*\"")]
    ComponentInvalid,
    #[error("\"{0}\" is reserved and cannot be used in a repository name")]
    ReservedComponent(String),
}

static NAME_COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").unwrap()
});

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").unwrap()
});

/// Extracts the repository name from a request path.
///
/// Strips the `/v2/` prefix, then scans components left to right and stops
/// at the first reserved endpoint keyword (`blobs`, `manifests`, `tags`,
/// `referrers`). The joined prefix is the repository name; it is validated
/// against the name grammar before being returned. A query string, if
/// present, is ignored.
pub fn parse_name(uri: &str) -> Result<String, NameError> {
    let path = uri.strip_prefix("/v2/").ok_or(NameError::MissingApiPrefix)?;
    let path = match path.split_once('?') {
        Some((before, _)) => before,
        None => path,
    };

    let mut components = Vec::new();
    for component in path.split('/') {
        if RESERVED_COMPONENTS.contains(&component) {
            break;
        }
        components.push(component);
    }

    let name = components.join("/");
    validate_repository_name(&name)?;
    Ok(name)
}

/// Ensures the repository name is valid for use in the registry.
///
/// The name must comply with the following grammar, with at least two
/// components, and no component may be one of the reserved endpoint
/// keywords:
///
/// ```text
/// alpha-numeric := /[a-z0-9]+/
/// separator := /[._-]/
/// component := alpha-numeric [separator alpha-numeric]*
/// name := component ['/' component]+
/// ```
pub fn validate_repository_name(name: &str) -> Result<(), NameError> {
    let components: Vec<&str> = name.split('/').collect();

    if components.len() < NAME_MIN_COMPONENTS {
        return Err(NameError::MissingComponents);
    }

    for component in components {
        if RESERVED_COMPONENTS.contains(&component) {
            return Err(NameError::ReservedComponent(component.to_owned()));
        }

        if !NAME_COMPONENT_RE.is_match(component) {
            return Err(NameError::ComponentInvalid);
        }
    }

    Ok(())
}

/// Validates a tag reference: one leading word character followed by up to
/// 127 characters of `[a-zA-Z0-9._-]`.
pub fn validate_reference(reference: &str) -> bool {
    REFERENCE_RE.is_match(reference)
}

/// Validates a repository name extracted by the router, mapping grammar
/// failures onto the wire-level `NAME_INVALID` error.
pub fn ensure_valid_name(name: &str) -> crate::registry::RegistryResult<()> {
    validate_repository_name(name).map_err(|e| {
        log::debug!("rejecting repository name {name:?}: {e}");
        crate::registry::RegistryError::NameInvalid(name.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_stops_at_endpoint_keyword() {
        let cases = [
            ("/v2/lib/app/blobs/uploads/", "lib/app"),
            ("/v2/lib/app/blobs/sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08", "lib/app"),
            ("/v2/some/long/chained/repo/name/blobs/uploads", "some/long/chained/repo/name"),
            ("/v2/test/image/manifests/tagtest0", "test/image"),
            ("/v2/test/image/tags/list", "test/image"),
            ("/v2/foo/bar/referrers/sha256:abc", "foo/bar"),
        ];

        for (uri, expected) in cases {
            assert_eq!(parse_name(uri).as_deref(), Ok(expected), "uri {uri}");
        }
    }

    #[test]
    fn parse_name_is_identity_for_grammatical_names() {
        let names = ["lib/app", "docker/stevvooe/app", "a0/b1/c2", "foo.com/bar/baz"];

        for name in names {
            let uri = format!("/v2/{name}/blobs/uploads/");
            assert_eq!(parse_name(&uri).as_deref(), Ok(name));
        }
    }

    #[test]
    fn parse_name_requires_two_components() {
        assert_eq!(
            parse_name("/v2/solo/blobs/uploads/"),
            Err(NameError::MissingComponents)
        );
        assert_eq!(parse_name("/v2/blobs/uploads/"), Err(NameError::MissingComponents));
    }

    #[test]
    fn parse_name_requires_api_prefix() {
        assert_eq!(parse_name("/v1/lib/app/tags/list"), Err(NameError::MissingApiPrefix));
        assert_eq!(parse_name("lib/app/tags/list"), Err(NameError::MissingApiPrefix));
    }

    #[test]
    fn parse_name_ignores_query_string() {
        assert_eq!(
            parse_name("/v2/lib/app/blobs/uploads/?digest=sha256:abc").as_deref(),
            Ok("lib/app")
        );
    }

    #[test]
    fn valid_repository_names() {
        let valid_names = [
            "simple/name",
            "library/ubuntu",
            "docker/stevvooe/app",
            "aa/aa/aa/aa/aa/aa/aa/aa/aa/bb/bb/bb/bb/bb/bb",
            "foo.com/bar/baz",
            "blog.foo.com/bar/baz",
            "aa-a/aa",
            "a/a",
            "a-a/a-a",
            "a0/b_1/c-2",
        ];

        for name in valid_names {
            assert!(
                validate_repository_name(name).is_ok(),
                "repository name '{name}' should be valid"
            );
        }
    }

    #[test]
    fn single_component_names_rejected() {
        for name in ["alpine", "ubuntu", "a"] {
            assert_eq!(validate_repository_name(name), Err(NameError::MissingComponents));
        }
    }

    #[test]
    fn invalid_name_components_rejected() {
        for name in ["asdf$$^/aa", "a-/aa/aa", "Upper/case", "foo//bar", "foo/bar/"] {
            assert_eq!(
                validate_repository_name(name),
                Err(NameError::ComponentInvalid),
                "repository name '{name}' should be invalid"
            );
        }
    }

    #[test]
    fn reserved_components_rejected() {
        for name in ["lib/blobs", "tags/app", "foo/manifests/bar", "foo/referrers"] {
            assert!(
                matches!(validate_repository_name(name), Err(NameError::ReservedComponent(_))),
                "repository name '{name}' should be reserved"
            );
        }
    }

    #[test]
    fn name_component_grammar() {
        let valid = ["hello", "hello-world", "hello.world", "hello_world", "a1b2c3", "a"];
        for component in valid {
            assert!(NAME_COMPONENT_RE.is_match(component), "'{component}' should match");
        }

        let invalid = [
            "Hello",       // uppercase
            "-hello",      // starts with separator
            "hello-",      // ends with separator
            "hel--lo",     // double separator
            "",            // empty
            "hello world", // contains space
        ];
        for component in invalid {
            assert!(!NAME_COMPONENT_RE.is_match(component), "'{component}' should not match");
        }
    }

    #[test]
    fn valid_references() {
        let long_tag_128 = "a".repeat(128);
        let valid_tags = [
            "latest",
            "v1.0.0",
            "main",
            "feature-branch",
            "test_tag",
            "tag.with.dots",
            "123",
            "a", // single-character tags are allowed
            "Tag-With-CAPS",
            long_tag_128.as_str(),
        ];

        for tag in valid_tags {
            assert!(validate_reference(tag), "tag '{tag}' should be valid");
        }
    }

    #[test]
    fn invalid_references() {
        let long_tag_129 = "a".repeat(129);
        let invalid_tags = [
            "",
            long_tag_129.as_str(),
            "-starts-with-dash",
            ".starts-with-dot",
            "has spaces",
            "has@symbol",
            "sha256:totallywrong", // ':' is not a tag character
        ];

        for tag in invalid_tags {
            assert!(!validate_reference(tag), "tag '{tag}' should be invalid");
        }
    }
}
