//! Credential output formats.
//!
//! Only these renderings go to stdout; everything else the CLI prints goes
//! to stderr so the output can be `eval`ed or consumed as `credential_process`.

use awsoidc_core::TemporaryCredential;
use awsoidc_core::credentials::CREDENTIAL_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct JsonCredential<'a> {
    #[serde(rename = "AWSAccessKey")]
    access_key: &'a str,
    #[serde(rename = "AWSSecretKey")]
    secret_key: &'a str,
    #[serde(rename = "AWSSessionToken")]
    session_token: &'a str,
    #[serde(rename = "Version")]
    version: u32,
}

/// Single-line JSON document.
pub fn json(credential: &TemporaryCredential) -> serde_json::Result<String> {
    serde_json::to_string(&JsonCredential {
        access_key: &credential.access_key,
        secret_key: &credential.secret_key,
        session_token: &credential.session_token,
        version: CREDENTIAL_SCHEMA_VERSION,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Posix,
    Windows,
}

impl Shell {
    pub fn current() -> Self {
        if cfg!(windows) {
            Shell::Windows
        } else {
            Shell::Posix
        }
    }

    fn assignment(self, name: &str, value: &str) -> String {
        match self {
            Shell::Posix => format!("export {name}={value}"),
            Shell::Windows => format!("set {name}={value}"),
        }
    }
}

/// Environment variable assignments, one per line.
pub fn exports(credential: &TemporaryCredential, shell: Shell) -> String {
    [
        ("AWS_ACCESS_KEY_ID", credential.access_key.as_str()),
        ("AWS_SECRET_ACCESS_KEY", credential.secret_key.as_str()),
        ("AWS_SESSION_TOKEN", credential.session_token.as_str()),
    ]
    .iter()
    .map(|(name, value)| shell.assignment(name, value) + "\n")
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn credential() -> TemporaryCredential {
        TemporaryCredential::new("ASIAEXAMPLE", "secret", "token", None)
    }

    #[test]
    fn json_has_exactly_four_fields() {
        let mut cred = credential();
        cred.version = 0;
        assert_eq!(
            json(&cred).unwrap(),
            r#"{"AWSAccessKey":"ASIAEXAMPLE","AWSSecretKey":"secret","AWSSessionToken":"token","Version":1}"#
        );
    }

    #[test]
    fn posix_exports() {
        assert_eq!(
            exports(&credential(), Shell::Posix),
            "export AWS_ACCESS_KEY_ID=ASIAEXAMPLE\n\
             export AWS_SECRET_ACCESS_KEY=secret\n\
             export AWS_SESSION_TOKEN=token\n"
        );
    }

    #[test]
    fn windows_uses_set() {
        let rendered = exports(&credential(), Shell::Windows);
        assert!(rendered.starts_with("set AWS_ACCESS_KEY_ID=ASIAEXAMPLE\n"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
