//! HMI vector codec.
//!
//! The device speaks a fixed-width state vector of 36 comma-separated
//! tokens. Each token is either the no-op sentinel `N` ("leave unchanged")
//! or a literal integer.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

pub const FIELD_COUNT: usize = 36;

pub const NO_OP: &str = "N";

/// Protocol field indices.
pub mod index {
    /// Target temperature, °C × 10.
    pub const TARGET_TEMPERATURE: usize = 0;
    /// Current temperature, °C × 10.
    pub const CURRENT_TEMPERATURE: usize = 1;
    pub const POWER: usize = 2;
    pub const OPERATION_MODE: usize = 3;
    pub const FAN_SPEED: usize = 4;
    pub const ECO: usize = 8;
    pub const TURBO: usize = 9;
    pub const NIGHT: usize = 10;
    pub const FIRMWARE: usize = 23;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    NoOp,
    Value(i32),
}

impl Field {
    pub fn value(self) -> Option<i32> {
        match self {
            Field::NoOp => None,
            Field::Value(v) => Some(v),
        }
    }

    pub fn is_no_op(self) -> bool {
        self == Field::NoOp
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::NoOp => f.write_str(NO_OP),
            Field::Value(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        if token == NO_OP {
            return Ok(Field::NoOp);
        }
        token
            .parse()
            .map(Field::Value)
            .map_err(|_| Error::InvalidToken(token.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmiVector([Field; FIELD_COUNT]);

impl Default for HmiVector {
    fn default() -> Self {
        Self::idle()
    }
}

impl HmiVector {
    /// Every field set to the sentinel.
    pub fn idle() -> Self {
        Self([Field::NoOp; FIELD_COUNT])
    }

    pub fn is_idle(&self) -> bool {
        self.0.iter().all(|f| f.is_no_op())
    }

    pub fn fields(&self) -> &[Field; FIELD_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Result<Field> {
        self.0.get(index).copied().ok_or(Error::IndexOutOfRange(index))
    }

    /// Integer at `index`, `None` for the sentinel or an out-of-range index.
    pub fn value(&self, index: usize) -> Option<i32> {
        self.0.get(index).and_then(|f| f.value())
    }

    pub fn with_field(&self, index: usize, value: i32) -> Result<Self> {
        let mut next = self.clone();
        next.set(index, Field::Value(value))?;
        Ok(next)
    }

    pub fn set(&mut self, index: usize, field: Field) -> Result<()> {
        let slot = self.0.get_mut(index).ok_or(Error::IndexOutOfRange(index))?;
        *slot = field;
        Ok(())
    }

    /// Resets every field that still holds the value it had in `sent`.
    /// Fields rewritten since `sent` was taken keep their newer value.
    pub fn clear_sent(&mut self, sent: &HmiVector) {
        for (slot, sent) in self.0.iter_mut().zip(sent.0.iter()) {
            if !sent.is_no_op() && slot == sent {
                *slot = Field::NoOp;
            }
        }
    }

    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(Field::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Strict decode: exactly 36 tokens, each the sentinel or an integer.
    pub fn decode(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split(',').collect();
        if tokens.len() != FIELD_COUNT {
            return Err(Error::MalformedVector {
                found: tokens.len(),
            });
        }
        let mut fields = [Field::NoOp; FIELD_COUNT];
        for (slot, token) in fields.iter_mut().zip(tokens) {
            *slot = token.parse()?;
        }
        Ok(Self(fields))
    }

    /// Tolerant decode for strings reported by the device: missing trailing
    /// fields are padded with the sentinel, extra fields are dropped and
    /// unparseable tokens read as the sentinel.
    pub fn decode_lenient(s: &str) -> Self {
        let mut fields = [Field::NoOp; FIELD_COUNT];
        for (slot, token) in fields.iter_mut().zip(s.trim().split(',')) {
            *slot = token.parse().unwrap_or_default();
        }
        Self(fields)
    }
}

impl fmt::Display for HmiVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for HmiVector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::IDLE_HMI;

    #[test]
    fn idle_round_trips_to_protocol_default() {
        let idle = HmiVector::idle();
        assert_eq!(idle.encode(), IDLE_HMI);
        assert_eq!(HmiVector::decode(IDLE_HMI).unwrap(), idle);
        assert!(idle.is_idle());
    }

    #[test]
    fn encode_always_has_36_tokens() {
        let v = HmiVector::idle().with_field(35, -4).unwrap();
        let encoded = v.encode();
        assert_eq!(encoded.split(',').count(), FIELD_COUNT);
        assert!(encoded.ends_with(",-4"));
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let s = "200,180,1,1,3,N,N,N,0,0,0,N,N,N,N,N,N,N,N,N,N,N,N,41,N,N,N,N,N,N,N,N,N,N,N,N";
        let v = HmiVector::decode(s).unwrap();
        assert_eq!(v.value(index::TARGET_TEMPERATURE), Some(200));
        assert_eq!(v.value(index::FIRMWARE), Some(41));
        assert_eq!(v.value(5), None);
        assert_eq!(v.encode(), s);
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let err = HmiVector::decode("N,N,N").unwrap_err();
        assert!(matches!(err, Error::MalformedVector { found: 3 }));

        let long = vec!["N"; 37].join(",");
        let err = HmiVector::decode(&long).unwrap_err();
        assert!(matches!(err, Error::MalformedVector { found: 37 }));
    }

    #[test]
    fn decode_rejects_garbage_token() {
        let mut tokens = vec!["N"; FIELD_COUNT];
        tokens[4] = "fast";
        let err = HmiVector::decode(&tokens.join(",")).unwrap_err();
        assert!(matches!(err, Error::InvalidToken(t) if t == "fast"));
    }

    #[test]
    fn with_field_touches_only_its_index() {
        let base = HmiVector::decode(
            "1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,32,33,34,35,36",
        )
        .unwrap();
        for i in 0..FIELD_COUNT {
            let next = base.with_field(i, 999).unwrap();
            for j in 0..FIELD_COUNT {
                if i == j {
                    assert_eq!(next.value(j), Some(999));
                } else {
                    assert_eq!(next.get(j).unwrap(), base.get(j).unwrap());
                }
            }
        }
    }

    #[test]
    fn with_field_rejects_out_of_range_index() {
        let err = HmiVector::idle().with_field(36, 1).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange(36)));
    }

    #[test]
    fn lenient_decode_pads_and_truncates() {
        let short = HmiVector::decode_lenient("210,190,1\n");
        assert_eq!(short.value(index::TARGET_TEMPERATURE), Some(210));
        assert_eq!(short.value(index::POWER), Some(1));
        assert_eq!(short.value(index::OPERATION_MODE), None);

        let long = format!("{IDLE_HMI},7,7");
        assert!(HmiVector::decode_lenient(&long).is_idle());

        assert!(HmiVector::decode_lenient("").is_idle());
        assert!(HmiVector::decode_lenient("x,y").is_idle());
    }

    #[test]
    fn clear_sent_keeps_newer_writes() {
        let sent = HmiVector::idle()
            .with_field(index::TARGET_TEMPERATURE, 220)
            .unwrap()
            .with_field(index::FAN_SPEED, 2)
            .unwrap();
        let mut pending = sent.with_field(index::FAN_SPEED, 4).unwrap();
        pending.clear_sent(&sent);

        assert_eq!(pending.value(index::TARGET_TEMPERATURE), None);
        assert_eq!(pending.value(index::FAN_SPEED), Some(4));
    }
}
