//! Certificate exchange: chains, requests, proof of possession and
//! stapled status messages for both schedule families.

use log::{debug, trace};
use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::error::Error;
use crate::extension::{consume_extensions, produce_extensions, Carrier};
use crate::handshake::Incoming;
use crate::message::{
    close_message, open_message, tls13_signed_content, Asn1Cert, Certificate, CertificateEntry,
    CertificateRequest, CertificateStatus, CertificateStatusType, CertificateVerify,
    ClientCertificateType, DigitallySigned, LegacyCertificate, LegacyCertificateRequest,
    MessageType,
};
use crate::types::{ClientAuth, KxFamily, Role, SignatureScheme, SignatureSchemeVec};

use super::{scheme_family, HandshakeContext};

/// Pick the scheme a server signs with: our preference order, restricted to
/// what the negotiated version allows, the loaded key can produce and the
/// client announced. A legacy client that sent no signature_algorithms gets
/// our first usable scheme.
pub(super) fn select_signing_scheme(ctx: &HandshakeContext) -> Result<SignatureScheme, Error> {
    let negotiated = ctx.negotiated()?;
    let signer = ctx
        .signer
        .as_ref()
        .ok_or(Error::Internal("no signing key loaded"))?;

    ctx.config
        .signature_schemes()
        .iter()
        .copied()
        .filter(|scheme| scheme.usable_with(negotiated))
        .filter(|scheme| signer.schemes().contains(scheme))
        .find(|scheme| match ctx.nego.peer_schemes() {
            Some(peer) => peer.contains(scheme),
            None => !negotiated.uses_tls13_schedule(),
        })
        .ok_or(Error::HandshakeFailure(
            "no mutually acceptable signature scheme",
        ))
}

/// Pick the scheme a client answers a certificate request with, or None when
/// nothing fits and the request is declined with an empty chain. The legacy
/// request constrains by certificate type and, when non empty, by its own
/// signature algorithm list.
fn select_client_scheme(
    ctx: &HandshakeContext,
    legacy: Option<&LegacyCertificateRequest<'_>>,
) -> Option<SignatureScheme> {
    let signer = ctx.signer.as_ref()?;
    let negotiated = ctx.nego.negotiated_version()?;

    let family_ok = |scheme: SignatureScheme| match legacy {
        Some(request) => request.certificate_types.iter().any(|t| match t {
            ClientCertificateType::RSA_SIGN => scheme_family(scheme) == KxFamily::Rsa,
            ClientCertificateType::ECDSA_SIGN => scheme_family(scheme) == KxFamily::Ecdhe,
            ClientCertificateType::Unknown(_) => false,
        }),
        None => true,
    };

    let offered_ok = |scheme: SignatureScheme| match legacy {
        Some(request) if !request.signature_algorithms.is_empty() => {
            request.signature_algorithms.contains(&scheme)
        }
        Some(_) => true,
        None => match ctx.nego.peer_schemes() {
            Some(peer) => peer.contains(&scheme),
            None => false,
        },
    };

    ctx.config
        .signature_schemes()
        .iter()
        .copied()
        .filter(|scheme| scheme.usable_with(negotiated))
        .filter(|scheme| signer.schemes().contains(scheme))
        .find(|scheme| family_ok(*scheme) && offered_ok(*scheme))
}

pub(super) fn produce_certificate(ctx: &mut HandshakeContext, out: &mut Buf) -> Result<(), Error> {
    let negotiated = ctx.negotiated()?;

    // A client answering a request it cannot satisfy sends an empty chain.
    let include = match ctx.role {
        Role::Server => true,
        Role::Client => ctx.client_cv_scheme.is_some(),
    };

    let mut body = Vec::new();
    let start = open_message(MessageType::Certificate, &mut body);
    {
        let chain: &[Vec<u8>] = if include {
            let identity = ctx
                .config
                .identity()
                .ok_or(Error::Internal("no identity to present"))?;
            &identity.certificates
        } else {
            &[]
        };

        if negotiated.uses_tls13_schedule() {
            let mut certificate = Certificate::new(&[]);
            for cert in chain {
                certificate.entries.push(CertificateEntry::new(Asn1Cert(cert)));
            }
            certificate.serialize(&mut body);
        } else {
            let mut certificate = LegacyCertificate::new();
            for cert in chain {
                certificate.certificate_list.push(Asn1Cert(cert));
            }
            certificate.serialize(&mut body);
        }
    }
    close_message(&mut body, start);

    if ctx.role == Role::Client {
        ctx.client_cert_sent = include;
        if !include {
            debug!("Declining the certificate request with an empty chain");
        }
    }

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_certificate(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    ctx.hash_in(incoming.raw);
    let negotiated = ctx.negotiated()?;

    let mut chain: Vec<Buf> = Vec::new();
    if negotiated.uses_tls13_schedule() {
        let (rest, certificate) = Certificate::parse(incoming.body)?;
        if !rest.is_empty() {
            return Err(Error::Decode("trailing bytes after certificate"));
        }
        if !certificate.request_context.is_empty() {
            return Err(Error::IllegalParameter(
                "certificate context must be empty in handshake",
            ));
        }
        for entry in &certificate.entries {
            chain.push(Buf::from_slice(&entry.cert_data));
        }
    } else {
        let (rest, certificate) = LegacyCertificate::parse(incoming.body)?;
        if !rest.is_empty() {
            return Err(Error::Decode("trailing bytes after certificate"));
        }
        for cert in &certificate.certificate_list {
            chain.push(Buf::from_slice(cert));
        }
    }
    debug!("Peer chain has {} certificates", chain.len());

    match ctx.role {
        Role::Client => {
            if chain.is_empty() {
                return match negotiated.uses_tls13_schedule() {
                    true => Err(Error::Decode("empty certificate chain")),
                    false => Err(Error::BadCertificate(
                        "server presented an empty chain".into(),
                    )),
                };
            }
            ctx.peer_certificates = chain;

            // With stapling agreed the chain is checked against the
            // CertificateStatus that follows, not here.
            if !ctx.validate_after_status {
                validate_peer_chain(ctx, None)?;
            }
        }
        Role::Server => {
            if chain.is_empty() {
                if ctx.config.client_auth() == ClientAuth::Required {
                    return Err(Error::CertificateRequired(
                        "client declined mandatory authentication",
                    ));
                }
                debug!("Client declined the certificate request");
                ctx.expected.remove(MessageType::CertificateVerify);
                return Ok(());
            }
            ctx.peer_certificates = chain;
            validate_peer_chain(ctx, None)?;
            ctx.client_cert_sent = true;
        }
    }
    Ok(())
}

/// Run the configured validator over the recorded peer chain.
pub(super) fn validate_peer_chain(
    ctx: &HandshakeContext,
    stapled: Option<&[u8]>,
) -> Result<(), Error> {
    let validator = ctx
        .config
        .validator()
        .ok_or(Error::Internal("no certificate validator"))?;

    let refs: Vec<&[u8]> = ctx.peer_certificates.iter().map(|cert| &cert[..]).collect();
    validator
        .verify_chain(&refs, stapled)
        .map_err(Error::BadCertificate)?;

    debug!("Peer certificate chain accepted ({} certificates)", refs.len());
    Ok(())
}

pub(super) fn produce_certificate_request(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let negotiated = ctx.negotiated()?;

    let mut body = Vec::new();
    let start = open_message(MessageType::CertificateRequest, &mut body);
    if negotiated.uses_tls13_schedule() {
        let mut request = CertificateRequest::new(&[]);
        let produced = produce_extensions(&mut ctx.nego, Carrier::CertificateRequest)?;
        request.extensions = produced.as_extensions();
        request.serialize(&mut body);
    } else {
        let mut types = ArrayVec::new();
        types.push(ClientCertificateType::RSA_SIGN);
        types.push(ClientCertificateType::ECDSA_SIGN);

        let mut schemes = SignatureSchemeVec::new();
        for scheme in ctx.config.signature_schemes() {
            if scheme.usable_with(negotiated) {
                schemes.push(*scheme);
            }
        }
        LegacyCertificateRequest::new(types, schemes).serialize(&mut body);
    }
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_certificate_request(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    ctx.hash_in(incoming.raw);
    let negotiated = ctx.negotiated()?;

    if negotiated.uses_tls13_schedule() {
        let (rest, request) = CertificateRequest::parse(incoming.body)?;
        if !rest.is_empty() {
            return Err(Error::Decode("trailing bytes after certificate request"));
        }
        if !request.request_context.is_empty() {
            return Err(Error::IllegalParameter(
                "request context must be empty in handshake",
            ));
        }
        consume_extensions(&mut ctx.nego, Carrier::CertificateRequest, &request.extensions)?;
        ctx.client_cv_scheme = select_client_scheme(ctx, None);
    } else {
        let (rest, request) = LegacyCertificateRequest::parse(incoming.body)?;
        if !rest.is_empty() {
            return Err(Error::Decode("trailing bytes after certificate request"));
        }
        ctx.client_cv_scheme = select_client_scheme(ctx, Some(&request));
    }

    ctx.client_cert_requested = true;
    if ctx.client_cv_scheme.is_none() {
        debug!("No usable identity for the certificate request");
    }
    Ok(())
}

pub(super) fn absent_certificate_request(_ctx: &mut HandshakeContext) -> Result<(), Error> {
    trace!("No certificate request from the server");
    Ok(())
}

pub(super) fn produce_certificate_verify(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let negotiated = ctx.negotiated()?;

    let (scheme, content) = if negotiated.uses_tls13_schedule() {
        let scheme = match ctx.role {
            Role::Server => select_signing_scheme(ctx)?,
            Role::Client => ctx
                .client_cv_scheme
                .ok_or(Error::Internal("no client signing scheme selected"))?,
        };
        let th = ctx.current_hash();
        (scheme, tls13_signed_content(ctx.role, &th))
    } else {
        // The legacy signature covers every handshake message so far.
        let scheme = ctx
            .client_cv_scheme
            .ok_or(Error::Internal("no client signing scheme selected"))?;
        let raw = ctx
            .raw_transcript
            .as_ref()
            .ok_or(Error::Internal("raw transcript not retained"))?;
        (scheme, raw.to_vec())
    };

    let mut signature = Buf::new();
    {
        let signer = ctx
            .signer
            .as_ref()
            .ok_or(Error::Internal("no signing key loaded"))?;
        signer
            .sign(scheme, &content, &mut signature)
            .map_err(Error::Crypto)?;
    }
    debug!("CertificateVerify via {:?}", scheme);

    let mut body = Vec::new();
    let start = open_message(MessageType::CertificateVerify, &mut body);
    CertificateVerify::new(DigitallySigned::new(scheme, &signature)).serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_certificate_verify(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    let (rest, verify) = CertificateVerify::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after certificate verify"));
    }

    let negotiated = ctx.negotiated()?;
    let scheme = verify.signed.scheme;
    if !ctx.config.signature_schemes().contains(&scheme) || !scheme.usable_with(negotiated) {
        return Err(Error::IllegalParameter(
            "peer signed with a scheme we do not accept",
        ));
    }

    // The signature covers the transcript up to but not including this
    // message, so verification happens before it is hashed in.
    let content = if negotiated.uses_tls13_schedule() {
        let th = ctx.current_hash();
        tls13_signed_content(ctx.role.peer(), &th)
    } else {
        ctx.raw_transcript
            .as_ref()
            .ok_or(Error::Internal("raw transcript not retained"))?
            .to_vec()
    };

    let leaf = ctx
        .peer_certificates
        .first()
        .ok_or(Error::Internal("no peer certificate on record"))?;
    let verifier = ctx.provider().signature_verification;
    if let Err(reason) = verifier.verify_signature(leaf, &content, verify.signed.signature, scheme)
    {
        debug!("CertificateVerify rejected: {}", reason);
        return Err(Error::DecryptError(
            "certificate verify signature check failed",
        ));
    }
    debug!("CertificateVerify via {:?} accepted", scheme);

    ctx.hash_in(incoming.raw);
    Ok(())
}

pub(super) fn absent_certificate_verify(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if ctx.role == Role::Server && ctx.client_cert_sent {
        return Err(Error::HandshakeFailure(
            "certificate presented without proof of possession",
        ));
    }
    Ok(())
}

pub(super) fn produce_certificate_status(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let mut body = Vec::new();
    let start = open_message(MessageType::CertificateStatus, &mut body);
    {
        let response = ctx
            .config
            .stapled_response()
            .ok_or(Error::Internal("no stapled response configured"))?;
        CertificateStatus::new(response).serialize(&mut body);
    }
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_certificate_status(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    ctx.hash_in(incoming.raw);

    let (rest, status) = CertificateStatus::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after certificate status"));
    }
    if status.status_type != CertificateStatusType::Ocsp {
        return Err(Error::IllegalParameter("unsupported certificate status type"));
    }
    debug!("Stapled status of {} bytes", status.response.len());

    validate_peer_chain(ctx, Some(status.response))?;
    ctx.validate_after_status = false;
    Ok(())
}

/// The server agreed to staple but sent no CertificateStatus. The chain
/// still has to pass validation, just without the staple.
pub(super) fn absent_certificate_status(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if ctx.validate_after_status {
        debug!("Server promised a staple but sent none");
        validate_peer_chain(ctx, None)?;
        ctx.validate_after_status = false;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_chain_declines_a_request() {
        let mut certificate = Certificate::new(&[]);
        assert!(certificate.is_empty());

        let mut body = Vec::new();
        certificate.serialize(&mut body);

        let (rest, parsed) = Certificate::parse(&body).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.is_empty());

        certificate.entries.push(CertificateEntry::new(Asn1Cert(&[0x30, 0x00])));
        assert!(!certificate.is_empty());
    }
}
