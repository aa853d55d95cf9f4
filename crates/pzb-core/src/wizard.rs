//! Conversation state machines.
//!
//! The setup wizard collects host → port → user → password → path. Each step
//! is an explicit state carrying what has been collected so far, so a handler
//! only has to store the state and feed it the next input.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{
    credentials::{
        parse_port, validate_host, validate_password, validate_remote_path, validate_user,
        CredentialRecord,
    },
    domain::UserId,
    errors::Error,
};

/// Which field the wizard is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStep {
    Host,
    Port,
    User,
    Password,
    Path,
}

#[derive(Clone, PartialEq, Eq)]
pub enum SetupState {
    AwaitingHost,
    AwaitingPort {
        host: String,
    },
    AwaitingUser {
        host: String,
        port: u16,
    },
    AwaitingPassword {
        host: String,
        port: u16,
        user: String,
    },
    AwaitingPath {
        host: String,
        port: u16,
        user: String,
        password: String,
    },
    Done,
}

impl std::fmt::Debug for SetupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Collected password stays out of logs.
        match self.step() {
            Some(step) => write!(f, "SetupState::Awaiting({step:?})"),
            None => write!(f, "SetupState::Done"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardInput {
    Text(String),
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardEffect {
    /// Field accepted; ask for the next one.
    Prompt(SetupStep),
    /// Field rejected; ask for the same one again.
    Reprompt { step: SetupStep, reason: String },
    /// All fields collected.
    Completed(CredentialRecord),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: SetupState,
    pub effect: WizardEffect,
    /// The input carried a secret; the chat message holding it should be removed.
    pub delete_input: bool,
}

impl SetupState {
    pub fn start() -> (Self, WizardEffect) {
        (SetupState::AwaitingHost, WizardEffect::Prompt(SetupStep::Host))
    }

    pub fn step(&self) -> Option<SetupStep> {
        match self {
            SetupState::AwaitingHost => Some(SetupStep::Host),
            SetupState::AwaitingPort { .. } => Some(SetupStep::Port),
            SetupState::AwaitingUser { .. } => Some(SetupStep::User),
            SetupState::AwaitingPassword { .. } => Some(SetupStep::Password),
            SetupState::AwaitingPath { .. } => Some(SetupStep::Path),
            SetupState::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, SetupState::Done)
    }

    /// Feed one input into the wizard.
    pub fn advance(self, input: WizardInput) -> Transition {
        let text = match input {
            WizardInput::Cancel => {
                return Transition {
                    state: SetupState::Done,
                    effect: WizardEffect::Cancelled,
                    delete_input: false,
                }
            }
            WizardInput::Text(t) => t,
        };

        match self {
            SetupState::AwaitingHost => match validate_host(&text) {
                Ok(host) => next(SetupState::AwaitingPort { host }, SetupStep::Port),
                Err(e) => reprompt(SetupState::AwaitingHost, SetupStep::Host, e),
            },
            SetupState::AwaitingPort { host } => match parse_port(&text) {
                Ok(port) => next(SetupState::AwaitingUser { host, port }, SetupStep::User),
                Err(e) => reprompt(SetupState::AwaitingPort { host }, SetupStep::Port, e),
            },
            SetupState::AwaitingUser { host, port } => match validate_user(&text) {
                Ok(user) => next(
                    SetupState::AwaitingPassword { host, port, user },
                    SetupStep::Password,
                ),
                Err(e) => reprompt(SetupState::AwaitingUser { host, port }, SetupStep::User, e),
            },
            SetupState::AwaitingPassword { host, port, user } => {
                match validate_password(&text) {
                    Ok(password) => Transition {
                        delete_input: true,
                        ..next(
                            SetupState::AwaitingPath {
                                host,
                                port,
                                user,
                                password,
                            },
                            SetupStep::Path,
                        )
                    },
                    Err(e) => reprompt(
                        SetupState::AwaitingPassword { host, port, user },
                        SetupStep::Password,
                        e,
                    ),
                }
            }
            SetupState::AwaitingPath {
                host,
                port,
                user,
                password,
            } => match validate_remote_path(&text) {
                Ok(remote_path) => Transition {
                    state: SetupState::Done,
                    effect: WizardEffect::Completed(CredentialRecord {
                        host,
                        port,
                        user,
                        password,
                        remote_path,
                    }),
                    delete_input: false,
                },
                Err(e) => reprompt(
                    SetupState::AwaitingPath {
                        host,
                        port,
                        user,
                        password,
                    },
                    SetupStep::Path,
                    e,
                ),
            },
            SetupState::Done => Transition {
                state: SetupState::Done,
                effect: WizardEffect::Cancelled,
                delete_input: false,
            },
        }
    }
}

fn next(state: SetupState, step: SetupStep) -> Transition {
    Transition {
        state,
        effect: WizardEffect::Prompt(step),
        delete_input: false,
    }
}

fn reprompt(state: SetupState, step: SetupStep, err: Error) -> Transition {
    Transition {
        state,
        effect: WizardEffect::Reprompt {
            step,
            reason: err.detail(),
        },
        delete_input: false,
    }
}

/// What a user is in the middle of.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Conversation {
    #[default]
    Idle,
    Setup(SetupState),
    AwaitingUpload,
}

/// Open conversations, one per user.
///
/// Starting a flow replaces whatever was open before (re-entry), and a finished
/// flow is removed rather than stored as `Done`.
#[derive(Debug, Default)]
pub struct ConversationBook {
    inner: Mutex<HashMap<UserId, Conversation>>,
}

impl ConversationBook {
    pub async fn get(&self, user: UserId) -> Conversation {
        self.inner
            .lock()
            .await
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(&self, user: UserId, conv: Conversation) {
        let mut map = self.inner.lock().await;
        match conv {
            Conversation::Idle | Conversation::Setup(SetupState::Done) => {
                map.remove(&user);
            }
            other => {
                map.insert(user, other);
            }
        }
    }

    /// Returns the conversation that was open, if any.
    pub async fn clear(&self, user: UserId) -> Conversation {
        self.inner
            .lock()
            .await
            .remove(&user)
            .unwrap_or_default()
    }
}
