//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::Utc;
use zeroize::Zeroizing;

use kapsul::crypto::kdf::Argon2Params;
use kapsul::errors::{KapsulError, Result};
use kapsul::repository::writer::new_encryption;
use kapsul::repository::CapsuleWriter;
use kapsul::storage::Configuration;
use kapsul::unlock::PassphrasePrompt;

/// Cheapest Argon2 parameters the KDF accepts.
pub fn fast_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

/// `.kapsul.toml` contents selecting `fast_params`.
pub const FAST_SETTINGS: &str = "\
argon2_memory_kib = 8192
argon2_iterations = 1
argon2_parallelism = 1
";

/// Answers prompts from a fixed list and counts every call.
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let prompt = Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            calls: Rc::clone(&calls),
        };
        (prompt, calls)
    }

    fn next(&mut self) -> Result<Zeroizing<String>> {
        self.calls.set(self.calls.get() + 1);
        self.answers
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| KapsulError::PromptFailed("script exhausted".into()))
    }
}

impl PassphrasePrompt for ScriptedPrompt {
    fn read_passphrase(&mut self, _label: &str) -> Result<Zeroizing<String>> {
        self.next()
    }

    fn read_new_passphrase(&mut self, _label: &str) -> Result<Zeroizing<String>> {
        self.next()
    }
}

/// Write an encrypted capsule holding `files` and return its path.
pub fn encrypted_capsule(
    dir: &Path,
    name: &str,
    passphrase: &str,
    files: &[(&str, &[u8])],
) -> PathBuf {
    let (descriptor, key) = new_encryption(fast_params(), passphrase.as_bytes()).unwrap();
    let mut writer = CapsuleWriter::new(Configuration::new(Some(descriptor)), Some(key)).unwrap();
    for (path, data) in files {
        writer.add_bytes(path, data, 0o644, Utc::now()).unwrap();
    }
    let path = dir.join(name);
    fs::write(&path, writer.finish().unwrap()).unwrap();
    path
}

/// Write a plaintext capsule holding `files` and return its path.
pub fn plaintext_capsule(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let mut writer = CapsuleWriter::new(Configuration::new(None), None).unwrap();
    for (path, data) in files {
        writer.add_bytes(path, data, 0o644, Utc::now()).unwrap();
    }
    let path = dir.join(name);
    fs::write(&path, writer.finish().unwrap()).unwrap();
    path
}
