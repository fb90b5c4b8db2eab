use nom::bytes::complete::take;
use nom::IResult;
use rand::RngCore;

use crate::error::Error;
use crate::types::ProtocolVersion;

/// The 32 byte nonce carried by ClientHello and ServerHello.
///
/// The trailing 8 bytes double as a downgrade protection channel: a server
/// that negotiates below the best version it supports overwrites them with a
/// fixed sentinel, and a client that offered a higher version aborts when it
/// finds one (RFC 8446 Section 4.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub const LENGTH: usize = 32;

    /// Magic server random marking a ServerHello as a HelloRetryRequest.
    pub const HELLO_RETRY_REQUEST: Random = Random([
        0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, //
        0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91, //
        0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, //
        0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
    ]);

    /// "DOWNGRD" + 0x01. Written when TLS 1.2 is selected below a 1.3 maximum.
    const DOWNGRADE_TLS12: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x01];

    /// "DOWNGRD" + 0x00. Written when TLS 1.1 or below is selected.
    const DOWNGRADE_TLS11: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x00];

    pub fn generate() -> Random {
        let mut bytes = [0; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Random(bytes)
    }

    /// Fresh server random carrying the downgrade sentinel when `negotiated`
    /// is below the best version the server would have accepted.
    pub fn generate_for_server(
        best: ProtocolVersion,
        negotiated: ProtocolVersion,
    ) -> Random {
        let mut random = Random::generate();
        if let Some(sentinel) = downgrade_sentinel(best, negotiated) {
            random.0[24..].copy_from_slice(&sentinel);
        }
        random
    }

    /// Client side downgrade detection. `best` is the highest version we
    /// offered, `negotiated` the version the server selected.
    ///
    /// The sentinel only counts when the margin is real: a server random that
    /// happens to end in sentinel bytes while versions match is left alone.
    pub fn check_downgrade(
        &self,
        best: ProtocolVersion,
        negotiated: ProtocolVersion,
    ) -> Result<(), Error> {
        let tail = &self.0[24..];

        if best.ordinal() >= ProtocolVersion::Tls1_3.ordinal()
            && negotiated.ordinal() < ProtocolVersion::Tls1_3.ordinal()
        {
            if tail == Self::DOWNGRADE_TLS12 || tail == Self::DOWNGRADE_TLS11 {
                return Err(Error::IllegalParameter("downgrade sentinel in server random"));
            }
        } else if best.ordinal() >= ProtocolVersion::Tls1_2.ordinal()
            && negotiated.ordinal() < ProtocolVersion::Tls1_2.ordinal()
            && tail == Self::DOWNGRADE_TLS11
        {
            return Err(Error::IllegalParameter("downgrade sentinel in server random"));
        }

        Ok(())
    }

    pub fn is_hello_retry(&self) -> bool {
        *self == Self::HELLO_RETRY_REQUEST
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = take(Self::LENGTH)(input)?;
        let mut random = [0; 32];
        random.copy_from_slice(bytes);
        Ok((input, Random(random)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.0);
    }
}

fn downgrade_sentinel(
    best: ProtocolVersion,
    negotiated: ProtocolVersion,
) -> Option<[u8; 8]> {
    if best.ordinal() >= ProtocolVersion::Tls1_3.ordinal()
        && negotiated.ordinal() < ProtocolVersion::Tls1_3.ordinal()
    {
        if negotiated.ordinal() >= ProtocolVersion::Tls1_2.ordinal() {
            Some(Random::DOWNGRADE_TLS12)
        } else {
            Some(Random::DOWNGRADE_TLS11)
        }
    } else if best.ordinal() >= ProtocolVersion::Tls1_2.ordinal()
        && negotiated.ordinal() < ProtocolVersion::Tls1_2.ordinal()
    {
        Some(Random::DOWNGRADE_TLS11)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_tail(tail: [u8; 8]) -> Random {
        let mut random = Random([0x42; 32]);
        random.0[24..].copy_from_slice(&tail);
        random
    }

    #[test]
    fn roundtrip() {
        let random = Random::generate();
        let mut out = Vec::new();
        random.serialize(&mut out);
        let (rest, parsed) = Random::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, random);
    }

    #[test]
    fn server_writes_sentinel_on_downgrade() {
        let random = Random::generate_for_server(ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_2);
        assert_eq!(&random.0[24..], Random::DOWNGRADE_TLS12);

        let random = Random::generate_for_server(ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_1);
        assert_eq!(&random.0[24..], Random::DOWNGRADE_TLS11);

        let random = Random::generate_for_server(ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_1);
        assert_eq!(&random.0[24..], Random::DOWNGRADE_TLS11);
    }

    #[test]
    fn server_leaves_random_alone_without_downgrade() {
        let random = Random::generate_for_server(ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_3);
        // 2^-64 flake odds, acceptable
        assert_ne!(&random.0[24..], Random::DOWNGRADE_TLS12);
        assert_ne!(&random.0[24..], Random::DOWNGRADE_TLS11);
    }

    #[test]
    fn client_detects_sentinel() {
        let random = with_tail(Random::DOWNGRADE_TLS12);
        assert!(random
            .check_downgrade(ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_2)
            .is_err());

        // a 1.3 offer also rejects the 1.1 sentinel
        let random = with_tail(Random::DOWNGRADE_TLS11);
        assert!(random
            .check_downgrade(ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_1)
            .is_err());

        let random = with_tail(Random::DOWNGRADE_TLS11);
        assert!(random
            .check_downgrade(ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_0)
            .is_err());
    }

    #[test]
    fn sentinel_ignored_without_margin() {
        // negotiated matches the best offer, tail bytes are just bytes
        let random = with_tail(Random::DOWNGRADE_TLS12);
        assert!(random
            .check_downgrade(ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_2)
            .is_ok());

        // the 1.2 sentinel is not checked when only 1.2 was offered
        let random = with_tail(Random::DOWNGRADE_TLS12);
        assert!(random
            .check_downgrade(ProtocolVersion::Tls1_2, ProtocolVersion::Tls1_1)
            .is_ok());
    }

    #[test]
    fn dtls_versions_use_same_margins() {
        let random = with_tail(Random::DOWNGRADE_TLS12);
        assert!(random
            .check_downgrade(ProtocolVersion::Dtls1_3, ProtocolVersion::Dtls1_2)
            .is_err());
    }

    #[test]
    fn hello_retry_magic() {
        assert!(Random::HELLO_RETRY_REQUEST.is_hello_retry());
        assert!(!Random::generate().is_hello_retry());
    }
}
