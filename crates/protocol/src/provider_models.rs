//! Agent providers and their command-line launch tables.
//!
//! Each provider is an external, independently-developed coding-agent CLI
//! that reads one full prompt from standard input and then works
//! autonomously. The quirks between them (non-interactive subcommands,
//! permission-bypass flags, structured-output flags) are kept as data in
//! [`ProviderCommand`] rather than branching string concatenation, so a
//! configuration file can override any of them without code changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier selecting which external agent CLI to launch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Codex,
    Gemini,
}

impl Provider {
    /// All supported providers.
    pub const ALL: [Provider; 3] = [Provider::Claude, Provider::Codex, Provider::Gemini];

    /// The lowercase name used in flags, file names and configuration keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(Provider::Claude),
            "codex" => Ok(Provider::Codex),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!(
                "unsupported provider: {other} (expected claude, codex or gemini)"
            )),
        }
    }
}

/// Launch description for one provider's CLI.
///
/// `argv` assembles the final command line from these pieces:
/// `program base_args.. [permission_flag] structured_output_flags..`.
/// `env` carries provider-specific environment overrides applied on top of
/// the sanitized subprocess environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProviderCommand {
    pub provider: Provider,

    /// Executable name looked up on PATH.
    pub program: String,

    /// Arguments that select the non-interactive, stdin-fed mode.
    #[serde(default)]
    pub base_args: Vec<String>,

    /// Flag that bypasses interactive permission prompts, when requested.
    #[serde(default)]
    pub permission_flag: Option<String>,

    /// Flags that switch the CLI's output stream to structured events,
    /// making the captured stream usable as a transcript.
    #[serde(default)]
    pub structured_output_flags: Vec<String>,

    /// Extra environment variables for the subprocess.
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl ProviderCommand {
    /// Built-in launch table for a provider.
    pub fn defaults(provider: Provider) -> Self {
        match provider {
            // Print mode enables streaming JSON output with stdin input.
            Provider::Claude => Self {
                provider,
                program: "claude".to_string(),
                base_args: vec!["-p".to_string()],
                permission_flag: Some("--dangerously-skip-permissions".to_string()),
                structured_output_flags: vec![
                    "--verbose".to_string(),
                    "--output-format".to_string(),
                    "stream-json".to_string(),
                ],
                env: Vec::new(),
            },
            // `exec` is the non-interactive subcommand that reads from stdin.
            Provider::Codex => Self {
                provider,
                program: "codex".to_string(),
                base_args: vec!["exec".to_string()],
                permission_flag: Some("--yolo".to_string()),
                structured_output_flags: vec!["--json".to_string()],
                env: Vec::new(),
            },
            Provider::Gemini => Self {
                provider,
                program: "gemini".to_string(),
                base_args: Vec::new(),
                permission_flag: Some("--yolo".to_string()),
                structured_output_flags: vec![
                    "--output-format".to_string(),
                    "stream-json".to_string(),
                ],
                // IDE integration trips over programmatic work directories.
                env: vec![("GEMINI_CLI_IDE_DISABLE".to_string(), "1".to_string())],
            },
        }
    }

    /// Assemble the full command line, program first.
    pub fn argv(&self, full_permissions: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(2 + self.base_args.len() + self.structured_output_flags.len());
        argv.push(self.program.clone());
        argv.extend(self.base_args.iter().cloned());
        if full_permissions {
            if let Some(flag) = &self.permission_flag {
                argv.push(flag.clone());
            }
        }
        argv.extend(self.structured_output_flags.iter().cloned());
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("Codex".parse::<Provider>().unwrap(), Provider::Codex);
        assert_eq!("GEMINI".parse::<Provider>().unwrap(), Provider::Gemini);
        assert!("cursor".parse::<Provider>().is_err());
    }

    #[test]
    fn test_claude_argv_with_permissions() {
        let cmd = ProviderCommand::defaults(Provider::Claude);
        let argv = cmd.argv(true);
        assert_eq!(
            argv,
            vec![
                "claude",
                "-p",
                "--dangerously-skip-permissions",
                "--verbose",
                "--output-format",
                "stream-json",
            ]
        );
    }

    #[test]
    fn test_codex_argv_without_permissions() {
        let cmd = ProviderCommand::defaults(Provider::Codex);
        let argv = cmd.argv(false);
        assert_eq!(argv, vec!["codex", "exec", "--json"]);
    }

    #[test]
    fn test_gemini_env_override() {
        let cmd = ProviderCommand::defaults(Provider::Gemini);
        assert_eq!(
            cmd.env,
            vec![("GEMINI_CLI_IDE_DISABLE".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_custom_command_argv_order() {
        let cmd = ProviderCommand {
            provider: Provider::Claude,
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), "echo hi".to_string()],
            permission_flag: None,
            structured_output_flags: Vec::new(),
            env: Vec::new(),
        };
        assert_eq!(cmd.argv(true), vec!["sh", "-c", "echo hi"]);
    }
}
