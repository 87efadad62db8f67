//! Human-readable progress on stderr.

use awsoidc_auth::{BrowserLauncher, ProgressEvent, ProgressSink};
use console::style;
use std::fmt::Display;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::CachedCredentialInvalid => "The previous credential isn't valid".to_string(),
        ProgressEvent::LoginSucceeded => "Login successful!".to_string(),
        ProgressEvent::CredentialPersisted { .. } => {
            "The AWS credentials has been saved in OS secret store".to_string()
        }
    }
}

pub fn stderr_sink() -> ProgressSink {
    Arc::new(|event: &ProgressEvent| {
        let marker = match event {
            ProgressEvent::CachedCredentialInvalid => style("!").yellow(),
            _ => style("✓").green(),
        };
        eprintln!("{marker} {}", describe(event));
    })
}

/// Writes `✗ <error>` for a failed command and picks the exit status.
pub fn report<E: Display>(result: Result<(), E>, stderr: &mut impl Write) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Nothing left to tell the user if stderr itself is gone.
            let _ = writeln!(stderr, "{} {err}", style("✗").red());
            ExitCode::FAILURE
        }
    }
}

/// Prints the authorization URL before handing it to the real browser,
/// so the user can still log in when no browser can be launched.
pub struct PromptingBrowser<B> {
    inner: B,
}

impl<B> PromptingBrowser<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

impl<B: BrowserLauncher> BrowserLauncher for PromptingBrowser<B> {
    fn open(&self, url: &str) -> io::Result<()> {
        eprintln!(
            "{} Opening the login page. If no browser appears, open this URL:\n  {}",
            style("▶").cyan(),
            url
        );
        self.inner.open(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<String>>);

    impl BrowserLauncher for Recording {
        fn open(&self, url: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn prompting_browser_delegates() {
        let browser = PromptingBrowser::new(Recording(Mutex::new(Vec::new())));
        browser.open("https://idp.example.com/authorize?x=1").unwrap();
        assert_eq!(
            browser.inner.0.lock().unwrap().as_slice(),
            ["https://idp.example.com/authorize?x=1".to_string()]
        );
    }

    #[test]
    fn report_maps_results_to_exit_codes() {
        let mut out = Vec::new();
        let code = report(Ok::<(), String>(()), &mut out);
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
        assert!(out.is_empty());

        let code = report(Err("no OIDC provider is configured"), &mut out);
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
        let rendered = console::strip_ansi_codes(std::str::from_utf8(&out).unwrap()).into_owned();
        assert_eq!(rendered, "✗ no OIDC provider is configured\n");
    }

    #[test]
    fn messages_match_the_login_milestones() {
        assert_eq!(
            describe(&ProgressEvent::CachedCredentialInvalid),
            "The previous credential isn't valid"
        );
        assert_eq!(describe(&ProgressEvent::LoginSucceeded), "Login successful!");
    }
}
