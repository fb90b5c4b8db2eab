use nom::IResult;

use crate::types::Role;

use super::DigitallySigned;

/// Proof of possession of the certificate key.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateVerify<'a> {
    pub signed: DigitallySigned<'a>,
}

impl<'a> CertificateVerify<'a> {
    pub fn new(signed: DigitallySigned<'a>) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateVerify<'a>> {
        let (input, signed) = DigitallySigned::parse(input)?;
        Ok((input, CertificateVerify { signed }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.signed.serialize(output);
    }
}

const CONTEXT_CLIENT: &[u8] = b"TLS 1.3, client CertificateVerify";
const CONTEXT_SERVER: &[u8] = b"TLS 1.3, server CertificateVerify";

/// The bytes a 1.3 CertificateVerify signature covers: 64 spaces, a role
/// bound context string, a zero byte and the transcript hash so far
/// (RFC 8446 Section 4.4.3). `signer` is the side producing the signature.
pub fn tls13_signed_content(signer: Role, transcript_hash: &[u8]) -> Vec<u8> {
    let context = match signer {
        Role::Client => CONTEXT_CLIENT,
        Role::Server => CONTEXT_SERVER,
    };

    let mut content = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    content.extend_from_slice(&[0x20; 64]);
    content.extend_from_slice(context);
    content.push(0x00);
    content.extend_from_slice(transcript_hash);
    content
}

#[cfg(test)]
mod test {
    use crate::types::SignatureScheme;

    use super::*;

    #[test]
    fn roundtrip() {
        const MESSAGE: &[u8] = &[
            0x08, 0x04, // rsa_pss_rsae_sha256
            0x00, 0x02, // signature length
            0xAB, 0xCD, // signature data
        ];

        let certificate_verify = CertificateVerify::new(DigitallySigned::new(
            SignatureScheme::RSA_PSS_RSAE_SHA256,
            &MESSAGE[4..6],
        ));

        let mut serialized = Vec::new();
        certificate_verify.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = CertificateVerify::parse(&serialized).unwrap();
        assert_eq!(parsed, certificate_verify);
        assert!(rest.is_empty());
    }

    #[test]
    fn signed_content_binds_role() {
        let hash = [0x11; 32];
        let client = tls13_signed_content(Role::Client, &hash);
        let server = tls13_signed_content(Role::Server, &hash);

        assert_ne!(client, server);
        assert_eq!(&client[..64], &[0x20; 64]);
        assert!(client.ends_with(&hash));
        // context string is NUL separated from the hash
        assert_eq!(client[64 + CONTEXT_CLIENT.len()], 0x00);
    }
}
