use crate::errors::{WalletError, WalletResult};
use regex::Regex;

const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_TEXT_LENGTH: usize = 256;
const MAX_CURRENCY_LENGTH: usize = 16;

/// Input validation for ledger-bound data coming from the UI layer
#[derive(Debug)]
pub struct InputValidator {
    // Blacklisted patterns for security
    malicious_patterns: Vec<Regex>,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let malicious_patterns = [
            r"<script",
            r"javascript:",
            r"data:text/html",
            r"vbscript:",
            r"onload=",
            r"onerror=",
        ]
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| WalletError::InvalidInput(format!("Invalid pattern: {}", e)))
        })
        .collect::<WalletResult<Vec<_>>>()?;

        Ok(InputValidator { malicious_patterns })
    }

    /// Validate a product or order identifier. Any characters are allowed.
    pub fn validate_identifier(&self, field: &str, value: &str) -> WalletResult<()> {
        self.check_basic_security(field, value)?;

        if value.trim().is_empty() {
            return Err(WalletError::InvalidInput(format!("{} is required", field)));
        }

        if value.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(WalletError::InvalidInput(format!("{} is too long", field)));
        }

        Ok(())
    }

    /// Validate a free-text field such as a product name or category
    pub fn validate_text(&self, field: &str, value: &str, required: bool) -> WalletResult<()> {
        self.check_basic_security(field, value)?;

        if required && value.trim().is_empty() {
            return Err(WalletError::InvalidInput(format!("{} is required", field)));
        }

        if value.chars().count() > MAX_TEXT_LENGTH {
            return Err(WalletError::InvalidInput(format!("{} is too long", field)));
        }

        Ok(())
    }

    /// Validate a currency label ("USD", "US$", or empty when unknown)
    pub fn validate_currency(&self, currency: &str) -> WalletResult<()> {
        self.check_basic_security("currency", currency)?;

        if currency.chars().count() > MAX_CURRENCY_LENGTH {
            return Err(WalletError::InvalidInput("currency is too long".to_string()));
        }
        Ok(())
    }

    /// Check for basic security issues in any input
    fn check_basic_security(&self, field: &str, input: &str) -> WalletResult<()> {
        if input.len() > 1000 {
            return Err(WalletError::InvalidInput(format!("{} is too long", field)));
        }

        let lowered = input.to_lowercase();
        if self
            .malicious_patterns
            .iter()
            .any(|pattern| pattern.is_match(&lowered))
        {
            return Err(WalletError::InvalidInput(format!(
                "{} contains potentially malicious content",
                field
            )));
        }

        Ok(())
    }
}
