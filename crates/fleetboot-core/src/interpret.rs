//! Command result interpretation
//!
//! The daemon answers in free text with no delimiters, so every decision here
//! is a text heuristic. They are kept in one place so each can be tested on
//! its own:
//!
//! - service presence: the process-list grep printed more than
//!   [`SHORT_OUTPUT_THRESHOLD`] characters;
//! - generated tokens (keys, addresses, tx hashes): the first line is the
//!   token unless it contains one of [`FAILURE_TOKENS`], case-insensitively.
//!   A legitimate token containing those letters is misclassified as a
//!   failure; this is kept as-is;
//! - confirmation: the tx hash appears anywhere in the outputs listing.

use fleetboot_exec::CommandOutput;
use serde::Serialize;

/// Process-list output at or below this many characters means "not running"
pub const SHORT_OUTPUT_THRESHOLD: usize = 21;

/// Substrings that mark a generated-token response as a failure
pub const FAILURE_TOKENS: [&str; 2] = ["not", "error"];

/// Which command produced an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// `<cli> stop`
    Stop,
    /// daemon start
    Start,
    /// `<cli> status`
    Status,
    /// `<cli> masternode status`
    MasternodeStatus,
    /// `<cli> getbalance`
    GetBalance,
    /// `<cli> masternode genkey`
    GenKey,
    /// `<cli> getaccountaddress <account>`
    AccountAddress,
    /// `<cli> sendtoaddress <addr> <amount>`
    SendToAddress,
    /// `<cli> masternode outputs`, looking for one transaction
    MasternodeOutputs { tx_hash: String },
    /// `ps -e|grep <name>`
    ServicePresence,
    /// `<cli> setgenerate true 1`
    SetGenerate,
    /// `<cli> startmasternode ...`
    StartMasternode,
    /// chain data removal or binary swap
    FileOperation,
}

/// Typed reading of one command output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", content = "value", rename_all = "snake_case")]
pub enum Decision {
    /// Daemon status: running or not
    Running(bool),
    /// Service presence
    Present(bool),
    /// Parsed balance
    Balance(f64),
    /// Extracted key, address or hash
    Token(String),
    /// Whether the awaited transaction shows up
    Confirmed(bool),
    /// The command did what was asked
    Accepted,
    /// The daemon said no
    Rejected(String),
    /// Output matched no known pattern
    Unrecognized(String),
}

/// Coarse classification of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    RecognizedFailure,
    Unrecognized,
}

impl Decision {
    #[must_use]
    pub fn classification(&self) -> Classification {
        match self {
            Decision::Rejected(_) => Classification::RecognizedFailure,
            Decision::Unrecognized(_) => Classification::Unrecognized,
            _ => Classification::Success,
        }
    }
}

/// Interpret `output` as the response to a command of `kind`
#[must_use]
pub fn interpret(kind: &CommandKind, output: &CommandOutput) -> Decision {
    match kind {
        CommandKind::ServicePresence => Decision::Present(service_present(output)),
        CommandKind::GenKey | CommandKind::AccountAddress | CommandKind::SendToAddress => {
            match generated_token(output) {
                Ok(token) => Decision::Token(token),
                Err(reason) => Decision::Rejected(reason),
            }
        }
        CommandKind::MasternodeOutputs { tx_hash } => {
            Decision::Confirmed(is_confirmed(output, tx_hash))
        }
        CommandKind::GetBalance => match output.first_line() {
            Some(line) => match line.parse::<f64>() {
                Ok(amount) => Decision::Balance(amount),
                Err(_) if mentions_error(line) => Decision::Rejected(line.to_string()),
                Err(_) => Decision::Unrecognized(line.to_string()),
            },
            None => Decision::Unrecognized(String::new()),
        },
        CommandKind::Status => {
            if output.is_blank() {
                Decision::Unrecognized(String::new())
            } else {
                let text = output.text().to_lowercase();
                Decision::Running(!(text.contains("error") || text.contains("couldn't connect")))
            }
        }
        // a live daemon that is not an active masternode answers with an error
        CommandKind::MasternodeStatus => {
            let text = output.text();
            if output.is_blank() || daemon_not_running(&text) {
                Decision::Running(false)
            } else if mentions_error(&text) {
                Decision::Rejected(text)
            } else {
                Decision::Running(true)
            }
        }
        CommandKind::Stop => {
            let text = output.text();
            let lower = text.to_lowercase();
            if lower.contains("stopping") {
                Decision::Accepted
            } else if mentions_error(&lower) {
                Decision::Rejected(text)
            } else {
                Decision::Unrecognized(text)
            }
        }
        CommandKind::Start | CommandKind::SetGenerate => {
            let text = output.text();
            if mentions_error(&text) {
                Decision::Rejected(text)
            } else {
                Decision::Accepted
            }
        }
        CommandKind::StartMasternode => {
            let text = output.text();
            if text.to_lowercase().contains("success") {
                Decision::Accepted
            } else if text.trim().is_empty() {
                Decision::Unrecognized(text)
            } else {
                Decision::Rejected(text)
            }
        }
        CommandKind::FileOperation => {
            let text = output.text();
            let lower = text.to_lowercase();
            let refused = lower.contains("denied")
                || lower.contains("cannot")
                || lower.contains("refused")
                || output.status.is_some_and(|s| s != 0);
            if refused {
                Decision::Rejected(if text.is_empty() {
                    format!("exit status {:?}", output.status)
                } else {
                    text
                })
            } else {
                Decision::Accepted
            }
        }
    }
}

/// Process-list grep found something
#[must_use]
pub fn service_present(output: &CommandOutput) -> bool {
    output.text().trim().chars().count() > SHORT_OUTPUT_THRESHOLD
}

/// Extract the generated token from the first output line
///
/// # Errors
/// Returns the offending line when it contains a failure token, or a message
/// when the output is empty
pub fn generated_token(output: &CommandOutput) -> Result<String, String> {
    let Some(line) = output.first_line() else {
        return Err("empty response".to_string());
    };
    let lower = line.to_lowercase();
    if FAILURE_TOKENS.iter().any(|t| lower.contains(t)) {
        return Err(line.to_string());
    }
    Ok(line.trim_matches('"').to_string())
}

/// The transaction hash appears anywhere in the output
#[must_use]
pub fn is_confirmed(output: &CommandOutput, tx_hash: &str) -> bool {
    !tx_hash.is_empty() && output.lines.iter().any(|l| l.contains(tx_hash))
}

/// A rejection that only says the daemon is not up
///
/// `stop` against a stopped daemon answers this way; callers treat it as
/// already done.
#[must_use]
pub fn daemon_not_running(reason: &str) -> bool {
    reason.to_lowercase().contains("couldn't connect to server")
}

fn mentions_error(text: &str) -> bool {
    text.to_lowercase().contains("error")
}
