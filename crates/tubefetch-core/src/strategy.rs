//! Extractor configurations tried in order by the cascade

use serde::{Deserialize, Serialize};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One named set of yt-dlp options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStrategy {
    pub name: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    /// Seconds
    #[serde(default)]
    pub socket_timeout: Option<u32>,
    #[serde(default)]
    pub no_check_certificate: bool,
    #[serde(default)]
    pub force_ipv4: bool,
    /// Passed to yt-dlp verbatim, before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ExtractionStrategy {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_agent: None,
            retries: None,
            socket_timeout: None,
            no_check_certificate: false,
            force_ipv4: false,
            extra_args: Vec::new(),
        }
    }

    /// Plain yt-dlp defaults, then a patient variant, then IPv4 only.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::named("standard"),
            Self {
                user_agent: Some(DESKTOP_USER_AGENT.to_string()),
                retries: Some(5),
                socket_timeout: Some(30),
                no_check_certificate: true,
                ..Self::named("resilient")
            },
            Self {
                retries: Some(3),
                force_ipv4: true,
                ..Self::named("ipv4")
            },
        ]
    }

    /// yt-dlp command-line arguments for this strategy
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref ua) = self.user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.clone());
        }
        if let Some(retries) = self.retries {
            args.push("--retries".to_string());
            args.push(retries.to_string());
            args.push("--fragment-retries".to_string());
            args.push(retries.to_string());
        }
        if let Some(timeout) = self.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(timeout.to_string());
        }
        if self.no_check_certificate {
            args.push("--no-check-certificates".to_string());
        }
        if self.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        args.extend(self.extra_args.iter().cloned());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_has_no_args() {
        assert!(ExtractionStrategy::named("standard").to_args().is_empty());
    }

    #[test]
    fn test_resilient_args() {
        let resilient = &ExtractionStrategy::builtin()[1];
        let args = resilient.to_args();

        assert_eq!(resilient.name, "resilient");
        assert!(args.windows(2).any(|w| w == ["--retries", "5"]));
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "30"]));
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert!(args.contains(&"--user-agent".to_string()));
    }

    #[test]
    fn test_extra_args_come_last() {
        let strategy = ExtractionStrategy {
            force_ipv4: true,
            extra_args: vec!["--geo-bypass".to_string()],
            ..ExtractionStrategy::named("custom")
        };

        assert_eq!(strategy.to_args(), vec!["--force-ipv4", "--geo-bypass"]);
    }
}
