use std::convert::TryInto;
use std::fmt::Display;
use std::str::FromStr;

use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

pub const LENGTH: usize = 6;

/// A one-time-password code.
///
/// Deliberately not `PartialEq`: codes must be compared with
/// [`ConstantTimeEq`] so that a mismatch reveals nothing about which digit
/// was wrong.
#[derive(Debug, Clone, Copy)]
pub struct Code {
    code: [u8; LENGTH],
}

impl Code {
    /// Build a code from the low decimal digits of `value`, zero padded.
    pub fn from_number(value: u32) -> Self {
        let mut code = [0; LENGTH];
        let mut rest = value;
        for digit in code.iter_mut().rev() {
            *digit = (rest % 10) as u8;
            rest /= 10;
        }
        Self { code }
    }
}

impl ConstantTimeEq for Code {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.code[..].ct_eq(&other.code[..])
    }
}

impl Display for Code {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for digit in self.code {
            write!(formatter, "{digit}")?;
        }
        Ok(())
    }
}

impl FromStr for Code {
    type Err = ParseError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let len = string.chars().count();
        if len != LENGTH {
            return Err(Self::Err::InvalidLength(len));
        }
        let digits = string
            .chars()
            .map(|c| match c {
                '0'..='9' => Ok(c as u8 - b'0'),
                _ => Err(Self::Err::InvalidChar(c)),
            })
            .collect::<Result<Vec<u8>, Self::Err>>()?;
        Ok(Self {
            code: digits.try_into().map_err(|_| Self::Err::InvalidLength(len))?,
        })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("code must contain exactly 6 characters")]
    InvalidLength(usize),
    #[error("code must contain only digits")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_small_numbers() {
        assert_eq!(Code::from_number(42).to_string(), "000042");
        assert_eq!(Code::from_number(1_234_567).to_string(), "234567");
    }

    #[test]
    fn parse_and_display_agree() {
        let code: Code = "012345".parse().unwrap();
        assert_eq!(code.to_string(), "012345");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("12345".parse::<Code>().unwrap_err(), ParseError::InvalidLength(5));
        assert_eq!("1234567".parse::<Code>().unwrap_err(), ParseError::InvalidLength(7));
        assert_eq!("12a456".parse::<Code>().unwrap_err(), ParseError::InvalidChar('a'));
    }

    #[test]
    fn constant_time_comparison() {
        let a: Code = "123456".parse().unwrap();
        let b: Code = "123456".parse().unwrap();
        let c: Code = "123457".parse().unwrap();
        assert!(bool::from(a.ct_eq(&b)));
        assert!(!bool::from(a.ct_eq(&c)));
    }
}
