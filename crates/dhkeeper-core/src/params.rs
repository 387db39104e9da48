//! DH parameter encoding
//!
//! The cache file holds a PEM `DH PARAMETERS` block: the PKCS#3
//! `DHParameter` structure (a DER SEQUENCE of prime and generator).
//! Parameters come from the standardized RFC 7919 finite-field groups, so
//! the generation worker's job is deterministic encoding rather than
//! per-host prime search.

use std::fmt;
use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{CoreError, Result};

/// RFC 7919 appendix A.1, 2048-bit prime
const FFDHE2048_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFADF85458A2BB4A9AAFDC5620273D3CF1",
    "D8B9C583CE2D3695A9E13641146433FBCC939DCE249B3EF9",
    "7D2FE363630C75D8F681B202AEC4617AD3DF1ED5D5FD6561",
    "2433F51F5F066ED0856365553DED1AF3B557135E7F57C935",
    "984F0C70E0E68B77E2A689DAF3EFE8721DF158A136ADE735",
    "30ACCA4F483A797ABC0AB182B324FB61D108A94BB2C8E3FB",
    "B96ADAB760D7F4681D4F42A3DE394DF4AE56EDE76372BB19",
    "0B07A7C8EE0A6D709E02FCE1CDF7E2ECC03404CD28342F61",
    "9172FE9CE98583FF8E4F1232EEF28183C3FE3B1B4C6FAD73",
    "3BB5FCBC2EC22005C58EF1837D1683B2C6F34A26C1B2EFFA",
    "886B423861285C97FFFFFFFFFFFFFFFF",
);

/// PEM armor lines for a parameters file
pub const PEM_BEGIN: &str = "-----BEGIN DH PARAMETERS-----";
pub const PEM_END: &str = "-----END DH PARAMETERS-----";

/// Finite-field Diffie-Hellman group written into the cache file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhGroup {
    Ffdhe2048,
}

impl DhGroup {
    /// Resolve a group by its configuration name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ffdhe2048" => Ok(DhGroup::Ffdhe2048),
            _ => Err(CoreError::UnknownGroup(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DhGroup::Ffdhe2048 => "ffdhe2048",
        }
    }

    pub fn generator(self) -> u8 {
        match self {
            DhGroup::Ffdhe2048 => 2,
        }
    }

    /// Big-endian bytes of the group prime
    pub fn prime(self) -> Result<Vec<u8>> {
        let hex = match self {
            DhGroup::Ffdhe2048 => FFDHE2048_PRIME_HEX,
        };
        hex::decode(hex).map_err(|err| CoreError::Encoding(err.to_string()))
    }
}

impl fmt::Display for DhGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// DER-encode the group as a PKCS#3 `DHParameter` SEQUENCE
pub fn encode_der(group: DhGroup) -> Result<Vec<u8>> {
    let prime = group.prime()?;

    let mut body = Vec::with_capacity(prime.len() + 16);
    push_integer(&mut body, &prime);
    push_integer(&mut body, &[group.generator()]);

    let mut der = Vec::with_capacity(body.len() + 4);
    der.push(0x30);
    push_length(&mut der, body.len());
    der.extend_from_slice(&body);
    Ok(der)
}

/// PEM-armor the DER encoding, 64 base64 characters per line
pub fn encode_pem(group: DhGroup) -> Result<String> {
    let der = encode_der(group)?;
    let encoded = STANDARD.encode(&der);

    let mut pem = String::with_capacity(encoded.len() + encoded.len() / 64 + 64);
    pem.push_str(PEM_BEGIN);
    pem.push('\n');
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(64));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    pem.push_str(PEM_END);
    pem.push('\n');
    Ok(pem)
}

/// Write the PEM encoding to an already-open descriptor
pub fn write_pem<W: Write>(group: DhGroup, out: &mut W) -> Result<()> {
    let pem = encode_pem(group)?;
    out.write_all(pem.as_bytes())?;
    Ok(())
}

fn push_integer(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut start = 0;
    while start + 1 < bytes.len() && bytes[start] == 0 {
        start += 1;
    }
    let trimmed = &bytes[start..];
    let needs_pad = trimmed[0] & 0x80 != 0;

    out.push(0x02);
    push_length(out, trimmed.len() + usize::from(needs_pad));
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}
