use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};
use rand::Rng;
use std::ops::Deref;
use std::fmt;

pub struct InvalidLength(&'static str, usize, usize, usize);

impl fmt::Debug for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::error::Error for InvalidLength {}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect {} length: {} <= {} <= {}",
            self.0, self.1, self.3, self.2
        )
    }
}

/// A variable length, u8 length prefixed byte string backed by a fixed array.
macro_rules! var_array {
    ($name:ident, $min:expr, $max:expr) => {
        #[derive(Clone, Copy)]
        pub struct $name([u8; $max], usize);

        impl $name {
            pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
                #[allow(unused_comparisons)]
                if data.len() < $min || data.len() > $max {
                    return Err(InvalidLength(stringify!($name), $min, $max, data.len()));
                }
                let mut array = [0; $max];
                array[..data.len()].copy_from_slice(data);
                Ok($name(array, data.len()))
            }

            pub fn empty() -> $name {
                $name([0; $max], 0)
            }

            pub fn random(len: usize) -> $name {
                let mut t = rand::thread_rng();
                assert!(len >= $min);
                assert!(len <= $max);
                let mut arr = [0; $max];
                for a in &mut arr[..len] {
                    *a = t.gen();
                }
                Self(arr, len)
            }

            pub fn is_empty(&self) -> bool {
                self.1 == 0
            }

            pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
                let (input, len) = be_u8(input)?;
                if (len as usize) < $min || (len as usize) > $max {
                    return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
                }
                let (input, data) = take(len as usize)(input)?;
                // unwrap() is ok because we check the size above.
                let instance = Self::try_new(data).unwrap();
                Ok((input, instance))
            }

            pub fn serialize(&self, output: &mut Vec<u8>) {
                output.push(self.1 as u8);
                output.extend_from_slice(&self.0[..self.1]);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:02x?})", stringify!($name), &self.0[..self.1])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.deref() == other.deref()
            }
        }

        impl Eq for $name {}

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                &self.0[..self.1]
            }
        }

        impl<'a> TryFrom<&'a [u8]> for $name {
            type Error = InvalidLength;

            fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }
    };
}

var_array!(SessionId, 0, 32);
var_array!(TicketNonce, 0, 255);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_id_limits() {
        assert!(SessionId::try_new(&[0u8; 32]).is_ok());
        assert!(SessionId::try_new(&[0u8; 33]).is_err());
        assert!(SessionId::try_new(&[]).is_ok());
    }

    #[test]
    fn parse_rejects_overlong() {
        // length byte 33 exceeds the 32 byte maximum
        let mut input = vec![33u8];
        input.extend_from_slice(&[0u8; 33]);
        assert!(SessionId::parse(&input).is_err());
    }

    #[test]
    fn roundtrip() {
        let id = SessionId::random(32);
        let mut out = Vec::new();
        id.serialize(&mut out);
        let (rest, parsed) = SessionId::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, id);
    }
}
