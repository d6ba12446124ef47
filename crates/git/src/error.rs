use std::fmt;

use serde::Serialize;

/// Failure class of a git invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloneErrorKind {
    AuthFailure,
    NotFound,
    Network,
    Timeout,
    Unknown,
}

impl fmt::Display for CloneErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AuthFailure => "authentication failed",
            Self::NotFound => "repository not found",
            Self::Network => "network error",
            Self::Timeout => "timed out",
            Self::Unknown => "git failed",
        })
    }
}

impl CloneErrorKind {
    /// Actionable suggestions shown next to the failed command.
    pub fn hints(self) -> Vec<String> {
        let hints: &[&str] = match self {
            Self::AuthFailure => &[
                "Check that your SSH key is loaded (`ssh-add -l`) or that a personal access token is configured for HTTPS",
                "If the repository is private, make sure your account has access to it",
                "Try the SSH form (git@host:owner/repo.git) or set a clone URL override",
            ],
            Self::NotFound => &[
                "Verify the owner/repo spelling",
                "Check the repository visibility: private repositories report as not found without credentials",
            ],
            Self::Network => &[
                "Check your internet connection and DNS settings",
                "If you are behind a proxy or VPN, make sure git is configured to use it",
            ],
            Self::Timeout => &[
                "The remote took too long to respond, try again",
                "Point the repository at a closer mirror with a clone URL override",
            ],
            Self::Unknown => &["Run the command shown above manually to see the full git output"],
        };
        hints.iter().map(|h| (*h).to_string()).collect()
    }
}

/// Ordered substring rules; the first match wins.
const RULES: &[(CloneErrorKind, &[&str])] = &[
    (CloneErrorKind::AuthFailure, &[
        "authentication failed",
        "could not read username",
        "could not read password",
        "permission denied (publickey)",
        "terminal prompts disabled",
        "invalid username or password",
        "host key verification failed",
        "the requested url returned error: 403",
    ]),
    (CloneErrorKind::NotFound, &[
        "repository not found",
        "does not appear to be a git repository",
        "does not exist",
        "the requested url returned error: 404",
        "not found in upstream origin",
        "did not match any file(s) known to git",
        "not our ref",
    ]),
    (CloneErrorKind::Network, &[
        "could not resolve host",
        "connection refused",
        "network is unreachable",
        "connection timed out",
        "failed to connect",
        "connection reset",
        "could not connect to server",
        "ssl certificate problem",
    ]),
    (CloneErrorKind::Timeout, &["deadline exceeded", "operation timed out"]),
];

/// Classify raw git output into an error kind.
pub fn classify(raw_output: &str) -> CloneErrorKind {
    let lower = raw_output.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(CloneErrorKind::Unknown, |(kind, _)| *kind)
}

/// A classified git failure.
///
/// Holds the exact command and URL so a caller can edit the URL and call the
/// executor again without re-resolving the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneError {
    pub kind: CloneErrorKind,
    pub command: String,
    pub raw_output: String,
    pub hints: Vec<String>,
    pub url: String,
}

impl CloneError {
    /// Build an error by classifying `raw_output`.
    pub fn from_output(
        command: impl Into<String>,
        url: impl Into<String>,
        raw_output: impl Into<String>,
    ) -> Self {
        let raw_output = raw_output.into();
        let kind = classify(&raw_output);
        Self::with_kind(kind, command, url, raw_output)
    }

    pub fn with_kind(
        kind: CloneErrorKind,
        command: impl Into<String>,
        url: impl Into<String>,
        raw_output: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            command: command.into(),
            raw_output: raw_output.into(),
            hints: kind.hints(),
            url: url.into(),
        }
    }

    /// `git` itself could not be started.
    pub fn spawn_failed(
        command: impl Into<String>,
        url: impl Into<String>,
        err: &std::io::Error,
    ) -> Self {
        let mut e = Self::with_kind(CloneErrorKind::Unknown, command, url, err.to_string());
        if err.kind() == std::io::ErrorKind::NotFound {
            e.hints = vec!["Install git and make sure it is on PATH".to_string()];
        }
        e
    }
}

impl fmt::Display for CloneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: `{}`", self.kind, self.command)?;
        if let Some(line) = self.raw_output.lines().rev().find(|l| !l.trim().is_empty()) {
            write!(f, " ({})", line.trim())?;
        }
        Ok(())
    }
}

impl std::error::Error for CloneError {}
