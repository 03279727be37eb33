//! Token wire framing.

use core::fmt;
use core::str::FromStr;

use crate::BrineError;

/// Maximum wire length of the decimal salt field (`u32::MAX` is ten digits).
const SALT_DIGITS: usize = 10;

/// The four wire fields of a token, split but not yet verified.
///
/// The grammar is `SALT "~" EXP "~" CT "~" MAC`: a decimal `u32` salt, an
/// optionally-empty decimal expiration, and two base64 fields. The base64
/// alphabet depends on the protocol version, so the fields are kept as text
/// here; the store decodes them once a MAC has been verified.
///
/// Parsing never allocates an error trail: any token that does not match the
/// grammar is [`BrineError::InvalidToken`], which the store maps to its
/// silent "no value" result.
pub struct Token {
    pub salt: String,
    pub expires: String,
    pub ciphertext: String,
    pub mac: String,
}

impl Token {
    /// The parsed expiration field, `None` when the token never expires.
    pub fn expires_at(&self) -> Option<u64> {
        if self.expires.is_empty() {
            None
        } else {
            self.expires.parse().ok()
        }
    }
}

fn is_decimal(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Token {
    type Err = BrineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.splitn(4, '~');
        let (Some(salt), Some(expires), Some(ciphertext), Some(mac)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(BrineError::InvalidToken);
        };

        if !is_decimal(salt) || salt.len() > SALT_DIGITS || salt.parse::<u32>().is_err() {
            return Err(BrineError::InvalidToken);
        }
        if !expires.is_empty() && (!is_decimal(expires) || expires.parse::<u64>().is_err()) {
            return Err(BrineError::InvalidToken);
        }
        if ciphertext.is_empty() || mac.is_empty() {
            return Err(BrineError::InvalidToken);
        }

        Ok(Token {
            salt: salt.to_owned(),
            expires: expires.to_owned(),
            ciphertext: ciphertext.to_owned(),
            mac: mac.to_owned(),
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}~{}~{}~{}",
            self.salt, self.expires, self.ciphertext, self.mac
        )
    }
}
