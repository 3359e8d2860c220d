//! Short code and verification code generation, plus custom code validation.

use crate::error::AppError;
use rand::Rng;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Default alphabet for generated short codes.
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default length of generated short codes.
pub const DEFAULT_CODE_LENGTH: usize = 6;

pub const MIN_CODE_LENGTH: usize = 4;
pub const MAX_CODE_LENGTH: usize = 32;

const VERIFICATION_CODE_LENGTH: usize = 6;

/// Codes that would shadow system routes.
const RESERVED_CODES: &[&str] = &["health", "admin"];

static CUSTOM_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{4,10}$").expect("custom code pattern is valid"));

/// Errors raised when building a generator.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CodeGeneratorError {
    #[error("Alphabet must contain at least two distinct ASCII alphanumeric characters")]
    AlphabetTooSmall,

    #[error("Alphabet contains an invalid character: {0:?}")]
    InvalidCharacter(char),

    #[error("Alphabet contains a duplicate character: {0:?}")]
    DuplicateCharacter(char),

    #[error("Code length must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}, got {0}")]
    InvalidLength(usize),

    #[error("Operating system RNG failed: {0}")]
    Entropy(String),
}

/// Produces candidate short codes.
///
/// Candidates carry no uniqueness guarantee; callers check availability
/// against the store.
#[cfg_attr(test, mockall::automock)]
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws each character uniformly from a configured alphabet.
///
/// Uses the thread-local RNG, which is fast and unpredictable enough for
/// public identifiers.
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    alphabet: Vec<u8>,
    length: usize,
}

impl RandomCodeGenerator {
    /// Builds a generator after validating the alphabet and length.
    ///
    /// # Errors
    ///
    /// Returns [`CodeGeneratorError`] if the alphabet has fewer than two
    /// characters, contains a non ASCII-alphanumeric or duplicate character,
    /// or if `length` is outside `MIN_CODE_LENGTH..=MAX_CODE_LENGTH`.
    pub fn new(alphabet: &str, length: usize) -> Result<Self, CodeGeneratorError> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
            return Err(CodeGeneratorError::InvalidLength(length));
        }

        let mut seen = HashSet::new();
        for c in alphabet.chars() {
            if !c.is_ascii_alphanumeric() {
                return Err(CodeGeneratorError::InvalidCharacter(c));
            }
            if !seen.insert(c) {
                return Err(CodeGeneratorError::DuplicateCharacter(c));
            }
        }

        if seen.len() < 2 {
            return Err(CodeGeneratorError::AlphabetTooSmall);
        }

        Ok(Self {
            alphabet: alphabet.as_bytes().to_vec(),
            length,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.as_bytes().to_vec(),
            length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())] as char)
            .collect()
    }
}

/// Generates numeric one-time verification codes from the OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationCodeGenerator;

impl VerificationCodeGenerator {
    /// Returns a six-digit code, leading zeros allowed.
    ///
    /// Bytes of 250 and above are rejected so every digit is equally likely.
    ///
    /// # Errors
    ///
    /// Returns [`CodeGeneratorError::Entropy`] if the system RNG fails.
    pub fn generate(&self) -> Result<String, CodeGeneratorError> {
        let mut code = String::with_capacity(VERIFICATION_CODE_LENGTH);
        let mut buffer = [0u8; 16];

        while code.len() < VERIFICATION_CODE_LENGTH {
            getrandom::fill(&mut buffer).map_err(|e| CodeGeneratorError::Entropy(e.to_string()))?;

            for byte in buffer.iter().filter(|b| **b < 250) {
                if code.len() == VERIFICATION_CODE_LENGTH {
                    break;
                }
                code.push(char::from(b'0' + byte % 10));
            }
        }

        Ok(code)
    }
}

/// Validates a caller-chosen short code.
///
/// # Rules
///
/// - 4-10 characters
/// - ASCII letters and digits only
/// - Not a reserved system path
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if !CUSTOM_CODE_RE.is_match(code) {
        return Err(AppError::bad_request(
            "Custom code must be 4-10 letters or digits",
            json!({ "code": code }),
        ));
    }

    if RESERVED_CODES.contains(&code.to_ascii_lowercase().as_str()) {
        return Err(AppError::bad_request(
            "This code is reserved",
            json!({ "code": code }),
        ));
    }

    Ok(())
}
