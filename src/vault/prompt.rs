//! Passphrase input

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use crate::redact::Passphrase;

/// Source of keystore passphrases.
pub trait PassphrasePrompt: Send + Sync {
    fn read_passphrase(&self, message: &str) -> io::Result<Passphrase>;
}

/// Masked terminal input.
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn read_passphrase(&self, message: &str) -> io::Result<Passphrase> {
        rpassword::prompt_password(message).map(Passphrase::new)
    }
}

/// Replays a fixed list of answers; once exhausted every read fails.
///
/// Used for unattended runs and tests.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<io::Result<String>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| Ok(a.into())).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Queue an input failure (closed stdin, no tty).
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(io::Error::new(kind, "scripted input failure")));
    }

    /// Number of prompts shown so far.
    pub fn times_asked(&self) -> usize {
        self.asked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.asked.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PassphrasePrompt for ScriptedPrompt {
    fn read_passphrase(&self, message: &str) -> io::Result<Passphrase> {
        self.asked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more answers")))
            .map(Passphrase::new)
    }
}
