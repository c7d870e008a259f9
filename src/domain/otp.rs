//! One-time passcodes sent by email.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::OTP_LENGTH;

/// What an OTP unlocks. Each purpose has its own slot per email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    /// Account verification, resend and MFA sign-in
    Verify,
    /// Forgotten password
    Reset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Verify => "verify",
            OtpPurpose::Reset => "reset",
        }
    }

    /// Subject line for the email carrying this code
    pub fn email_subject(&self) -> &'static str {
        match self {
            OtpPurpose::Verify => "Your verification code",
            OtpPurpose::Reset => "Your password reset code",
        }
    }
}

/// Numeric passcode
#[derive(Clone, PartialEq, Eq)]
pub struct Otp(String);

impl std::fmt::Debug for Otp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Otp([REDACTED])")
    }
}

impl Otp {
    /// Random code of `OTP_LENGTH` digits. Leading zeros are kept.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..OTP_LENGTH)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_otp_is_six_digits() {
        for _ in 0..50 {
            let otp = Otp::generate();
            assert_eq!(otp.as_str().len(), OTP_LENGTH);
            assert!(otp.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_debug_hides_code() {
        let otp = Otp::generate();
        assert!(!format!("{:?}", otp).contains(otp.as_str()));
    }
}
