//! Auto-resolution policies for engine callbacks.
//!
//! Dialogs, TLS errors and HTTP auth challenges must never block a
//! navigation, so each one is answered synchronously from fixed policy.
//! The script-timeout debounce is the only piece with state, and that
//! state is scoped to a single navigation.

use serde::{Deserialize, Serialize};

/// Type of JavaScript dialog raised by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// A dialog raised by the page, as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    /// Type of dialog
    pub dialog_type: DialogType,
    /// Message displayed in the dialog
    pub message: String,
    /// Default value (prompt dialogs only)
    pub default_value: Option<String>,
}

impl Dialog {
    /// Create a new dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            default_value: None,
        }
    }

    /// Create a prompt dialog with an optional default value
    #[must_use]
    pub fn prompt(message: impl Into<String>, default: Option<String>) -> Self {
        Self {
            default_value: default,
            ..Self::new(DialogType::Prompt, message)
        }
    }
}

/// Answer given to a dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Dialog accepted (OK/Yes/Leave)
    Accept,
    /// Dialog accepted with input text (prompts)
    AcceptWith(String),
    /// Dialog dismissed (Cancel/No/Stay)
    Dismiss,
}

/// How dialogs are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoDialogBehavior {
    /// Accept every dialog; prompts take their default value when present
    #[default]
    AcceptAll,
    /// Dismiss every dialog
    DismissAll,
    /// Accept, answering prompts with an empty string
    AcceptEmpty,
}

/// Answer to a TLS certificate error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SslDecision {
    /// Ignore the certificate error and continue loading
    #[default]
    Proceed,
    /// Abort the request
    Cancel,
}

/// Answer to an HTTP authentication challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthDecision {
    /// Cancel the challenge without credentials
    #[default]
    Cancel,
}

/// Fixed answers for engine callbacks that would otherwise block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponsePolicy {
    /// Dialog answering behavior
    pub dialogs: AutoDialogBehavior,
    /// TLS error answer
    pub ssl_errors: SslDecision,
    /// HTTP auth answer
    pub http_auth: AuthDecision,
}

impl ResponsePolicy {
    /// Answer a dialog
    #[must_use]
    pub fn answer_dialog(&self, dialog: &Dialog) -> DialogAction {
        match self.dialogs {
            AutoDialogBehavior::AcceptAll => match (&dialog.dialog_type, &dialog.default_value) {
                (DialogType::Prompt, Some(default)) => DialogAction::AcceptWith(default.clone()),
                _ => DialogAction::Accept,
            },
            AutoDialogBehavior::DismissAll => DialogAction::Dismiss,
            AutoDialogBehavior::AcceptEmpty => match dialog.dialog_type {
                DialogType::Prompt => DialogAction::AcceptWith(String::new()),
                _ => DialogAction::Accept,
            },
        }
    }
}

/// Debounce for repeated script-execution timeouts.
///
/// The engine asks after each long-running script whether to abort it. The
/// answer is "continue" until more than `threshold` timeouts were reported
/// during the current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTimeoutDebounce {
    count: u32,
    threshold: u32,
}

impl ScriptTimeoutDebounce {
    /// Create a debounce with the given threshold
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Record a timeout; returns true when the script should be aborted
    pub fn on_timeout(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count > self.threshold
    }

    /// Timeouts seen since the last reset
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Clear the counter
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
