//! Binary macaroon decoding
//!
//! LND writes macaroons to disk in the binary encoding used by
//! `gopkg.in/macaroon.v2`. Both binary versions are understood: V2 (varint framed
//! fields, what current LND writes) and V1 (hex-length framed packets).
//! Decoding only checks structure; the signature is verified by the server.

use std::fmt;

const SIGNATURE_LEN: usize = 32;

const FIELD_EOS: usize = 0;
const FIELD_LOCATION: usize = 1;
const FIELD_IDENTIFIER: usize = 2;
const FIELD_VERIFICATION_ID: usize = 4;
const FIELD_SIGNATURE: usize = 6;

const PACKET_PREFIX_LEN: usize = 4;

/// Binary encoding a macaroon was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

/// A single caveat restricting the macaroon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    pub location: Option<String>,
    pub identifier: Vec<u8>,
    /// Present only for third party caveats.
    pub verification_id: Option<Vec<u8>>,
}

impl Caveat {
    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_none()
    }
}

/// Structured macaroon decoded from its binary form.
///
/// The exact bytes consumed by the decoder are retained so the token can be
/// sent to LND unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Macaroon {
    version: Version,
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_LEN],
    encoded: Vec<u8>,
}

impl Macaroon {
    /// Decodes a binary macaroon, detecting the version from the first byte.
    ///
    /// Bytes following the signature are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (parts, rest) = match data.first() {
            None => return Err(DecodeError::Empty),
            Some(2) => decode_v2(data)?,
            Some(byte) if byte.is_ascii_hexdigit() => decode_v1(data)?,
            Some(_) => return Err(DecodeError::UnknownFormat),
        };
        let consumed = data.len() - rest.len();

        Ok(Macaroon {
            version: parts.version,
            location: parts.location,
            identifier: parts.identifier,
            caveats: parts.caveats,
            signature: parts.signature,
            encoded: data[..consumed].to_vec(),
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// The binary encoding this macaroon was decoded from.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Lowercase hex of the binary encoding, the form LND accepts in request metadata.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.encoded)
    }
}

// The signature and raw encoding are bearer secrets, keep them out of logs.
impl fmt::Debug for Macaroon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Macaroon")
            .field("version", &self.version)
            .field("location", &self.location)
            .field("identifier", &String::from_utf8_lossy(&self.identifier))
            .field("caveats", &self.caveats.len())
            .finish_non_exhaustive()
    }
}

/// Error returned when bytes are not a valid binary macaroon.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    Empty,
    UnknownFormat,
    Truncated,
    VarintOutOfRange,
    FieldsOutOfOrder,
    InvalidHeader,
    MissingCaveatIdentifier,
    InvalidCaveat,
    LocationInFirstPartyCaveat,
    MissingSignature,
    SignatureLength(usize),
    InvalidPacketSize,
    MalformedPacket,
    UnexpectedField(String),
    RepeatedField(&'static str),
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DecodeError::*;

        match self {
            Empty => write!(f, "empty macaroon data"),
            UnknownFormat => write!(f, "cannot determine data format of binary-encoded macaroon"),
            Truncated => write!(f, "macaroon data ends prematurely"),
            VarintOutOfRange => write!(f, "varint value out of range"),
            FieldsOutOfOrder => write!(f, "fields out of order"),
            InvalidHeader => write!(f, "invalid macaroon header"),
            MissingCaveatIdentifier => write!(f, "no identifier in caveat"),
            InvalidCaveat => write!(f, "unexpected fields in caveat"),
            LocationInFirstPartyCaveat => write!(f, "location not allowed in first party caveat"),
            MissingSignature => write!(f, "unexpected field found instead of signature"),
            SignatureLength(len) => write!(f, "signature has unexpected length {}", len),
            InvalidPacketSize => write!(f, "invalid packet size"),
            MalformedPacket => write!(f, "malformed packet"),
            UnexpectedField(name) => write!(f, "unexpected field {:?}", name),
            RepeatedField(name) => write!(f, "repeated field {:?} in caveat", name),
            InvalidUtf8 => write!(f, "location is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

struct Parts {
    version: Version,
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_LEN],
}

fn location(data: &[u8]) -> Result<Option<String>, DecodeError> {
    if data.is_empty() {
        return Ok(None);
    }
    String::from_utf8(data.to_vec())
        .map(Some)
        .map_err(|_| DecodeError::InvalidUtf8)
}

fn signature(data: &[u8]) -> Result<[u8; SIGNATURE_LEN], DecodeError> {
    if data.len() != SIGNATURE_LEN {
        return Err(DecodeError::SignatureLength(data.len()));
    }
    let mut signature = [0; SIGNATURE_LEN];
    signature.copy_from_slice(data);
    Ok(signature)
}

struct Field<'a> {
    kind: usize,
    data: &'a [u8],
}

fn read_varint(data: &[u8]) -> Result<(usize, &[u8]), DecodeError> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate() {
        // anything wider than 31 bits is rejected anyway
        if i == 5 {
            return Err(DecodeError::VarintOutOfRange);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if value > 0x7fff_ffff {
                return Err(DecodeError::VarintOutOfRange);
            }
            return Ok((value as usize, &data[(i + 1)..]));
        }
    }
    Err(DecodeError::Truncated)
}

fn read_field(data: &[u8]) -> Result<(Field<'_>, &[u8]), DecodeError> {
    let (kind, rest) = read_varint(data)?;
    if kind == FIELD_EOS {
        return Ok((Field { kind, data: &[] }, rest));
    }
    let (len, rest) = read_varint(rest)?;
    if len > rest.len() {
        return Err(DecodeError::Truncated);
    }
    let (payload, rest) = rest.split_at(len);
    Ok((Field { kind, data: payload }, rest))
}

/// Reads fields up to and including the EOS marker.
fn read_section(mut data: &[u8]) -> Result<(Vec<Field<'_>>, &[u8]), DecodeError> {
    let mut fields: Vec<Field<'_>> = Vec::new();
    loop {
        if data.is_empty() {
            return Err(DecodeError::Truncated);
        }
        let (field, rest) = read_field(data)?;
        if field.kind == FIELD_EOS {
            return Ok((fields, rest));
        }
        if fields.last().map_or(false, |last| field.kind <= last.kind) {
            return Err(DecodeError::FieldsOutOfOrder);
        }
        fields.push(field);
        data = rest;
    }
}

fn split_location<'a, 'b>(section: &'b [Field<'a>]) -> Result<(Option<String>, &'b [Field<'a>]), DecodeError> {
    match section.split_first() {
        Some((field, rest)) if field.kind == FIELD_LOCATION => Ok((location(field.data)?, rest)),
        _ => Ok((None, section)),
    }
}

fn caveat_v2(section: &[Field<'_>]) -> Result<Caveat, DecodeError> {
    let (location, section) = split_location(section)?;
    match section {
        [id] if id.kind == FIELD_IDENTIFIER => {
            if location.is_some() {
                return Err(DecodeError::LocationInFirstPartyCaveat);
            }
            Ok(Caveat {
                location: None,
                identifier: id.data.to_vec(),
                verification_id: None,
            })
        },
        [id, vid] if id.kind == FIELD_IDENTIFIER && vid.kind == FIELD_VERIFICATION_ID => Ok(Caveat {
            location,
            identifier: id.data.to_vec(),
            verification_id: Some(vid.data.to_vec()),
        }),
        [id, ..] if id.kind == FIELD_IDENTIFIER => Err(DecodeError::InvalidCaveat),
        _ => Err(DecodeError::MissingCaveatIdentifier),
    }
}

fn decode_v2(data: &[u8]) -> Result<(Parts, &[u8]), DecodeError> {
    // version byte already checked by the caller
    let (header, mut data) = read_section(&data[1..])?;
    let (location, header) = split_location(&header)?;
    let identifier = match header {
        [id] if id.kind == FIELD_IDENTIFIER => id.data.to_vec(),
        _ => return Err(DecodeError::InvalidHeader),
    };

    let mut caveats = Vec::new();
    loop {
        let (section, rest) = read_section(data)?;
        data = rest;
        if section.is_empty() {
            break;
        }
        caveats.push(caveat_v2(&section)?);
    }

    let (field, rest) = read_field(data)?;
    if field.kind != FIELD_SIGNATURE {
        return Err(DecodeError::MissingSignature);
    }

    let parts = Parts {
        version: Version::V2,
        location,
        identifier,
        caveats,
        signature: signature(field.data)?,
    };
    Ok((parts, rest))
}

struct Packet<'a> {
    name: &'a [u8],
    data: &'a [u8],
}

fn read_packet(data: &[u8]) -> Result<(Packet<'_>, &[u8]), DecodeError> {
    if data.len() < PACKET_PREFIX_LEN {
        return Err(DecodeError::Truncated);
    }
    let size = hex::decode(&data[..PACKET_PREFIX_LEN]).map_err(|_| DecodeError::InvalidPacketSize)?;
    let size = usize::from(u16::from_be_bytes([size[0], size[1]]));
    if size > data.len() {
        return Err(DecodeError::Truncated);
    }
    if size < PACKET_PREFIX_LEN + 2 {
        return Err(DecodeError::InvalidPacketSize);
    }

    let (packet, rest) = data.split_at(size);
    let body = &packet[PACKET_PREFIX_LEN..];
    let space = match body.iter().position(|&byte| byte == b' ') {
        Some(0) | None => return Err(DecodeError::MalformedPacket),
        Some(space) => space,
    };
    let value = body[(space + 1)..]
        .strip_suffix(b"\n")
        .ok_or(DecodeError::MalformedPacket)?;

    Ok((Packet { name: &body[..space], data: value }, rest))
}

fn expect_packet<'a>(data: &'a [u8], name: &str) -> Result<(&'a [u8], &'a [u8]), DecodeError> {
    let (packet, rest) = read_packet(data)?;
    if packet.name != name.as_bytes() {
        return Err(DecodeError::UnexpectedField(String::from_utf8_lossy(packet.name).into_owned()));
    }
    Ok((packet.data, rest))
}

#[derive(Default)]
struct PendingCaveat {
    location: Option<String>,
    identifier: Option<Vec<u8>>,
    verification_id: Option<Vec<u8>>,
}

impl PendingCaveat {
    fn finish(self) -> Option<Caveat> {
        Some(Caveat {
            identifier: self.identifier?,
            location: self.location,
            verification_id: self.verification_id,
        })
    }
}

fn decode_v1(data: &[u8]) -> Result<(Parts, &[u8]), DecodeError> {
    let (location_data, data) = expect_packet(data, "location")?;
    let (identifier, mut data) = expect_packet(data, "identifier")?;

    let mut caveats = Vec::new();
    let mut pending = PendingCaveat::default();
    loop {
        let (packet, rest) = read_packet(data)?;
        data = rest;
        match packet.name {
            b"signature" => {
                caveats.extend(pending.finish());
                let parts = Parts {
                    version: Version::V1,
                    location: location(location_data)?,
                    identifier: identifier.to_vec(),
                    caveats,
                    signature: signature(packet.data)?,
                };
                return Ok((parts, data));
            },
            b"cid" => {
                if pending.identifier.is_some() {
                    caveats.extend(std::mem::take(&mut pending).finish());
                }
                pending.identifier = Some(packet.data.to_vec());
            },
            b"vid" => {
                if pending.verification_id.is_some() {
                    return Err(DecodeError::RepeatedField("vid"));
                }
                pending.verification_id = Some(packet.data.to_vec());
            },
            b"cl" => {
                if pending.location.is_some() {
                    return Err(DecodeError::RepeatedField("cl"));
                }
                pending.location = location(packet.data)?;
            },
            other => return Err(DecodeError::UnexpectedField(String::from_utf8_lossy(other).into_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field(out: &mut Vec<u8>, kind: u8, data: &[u8]) {
        out.push(kind);
        out.push(data.len() as u8);
        out.extend_from_slice(data);
    }

    fn v2_sample() -> Vec<u8> {
        let mut out = vec![2];
        field(&mut out, 1, b"lnd");
        field(&mut out, 2, b"\x03root-key-id");
        out.push(0);
        field(&mut out, 2, b"time-before 2030-01-01T00:00:00Z");
        out.push(0);
        field(&mut out, 1, b"https://auth.example");
        field(&mut out, 2, b"third-party");
        field(&mut out, 4, b"vid");
        out.push(0);
        out.push(0);
        field(&mut out, 6, &[7; 32]);
        out
    }

    fn packet(name: &str, value: &[u8]) -> Vec<u8> {
        let size = PACKET_PREFIX_LEN + name.len() + 1 + value.len() + 1;
        let mut out = format!("{:04x}{} ", size, name).into_bytes();
        out.extend_from_slice(value);
        out.push(b'\n');
        out
    }

    #[test]
    fn decodes_v2() {
        let bytes = v2_sample();
        let macaroon = Macaroon::decode(&bytes).unwrap();

        assert_eq!(macaroon.version(), Version::V2);
        assert_eq!(macaroon.location(), Some("lnd"));
        assert_eq!(macaroon.identifier(), b"\x03root-key-id");
        assert_eq!(macaroon.caveats().len(), 2);
        assert!(macaroon.caveats()[0].is_first_party());
        assert_eq!(macaroon.caveats()[1].location.as_deref(), Some("https://auth.example"));
        assert_eq!(macaroon.caveats()[1].verification_id.as_deref(), Some(&b"vid"[..]));
        assert_eq!(macaroon.signature(), &[7; 32]);
        assert_eq!(macaroon.encoded(), &bytes[..]);
        assert_eq!(macaroon.to_hex(), hex::encode(&bytes));
    }

    #[test]
    fn decodes_v2_without_location_or_caveats() {
        let mut bytes = vec![2];
        field(&mut bytes, 2, b"id");
        bytes.extend_from_slice(&[0, 0]);
        field(&mut bytes, 6, &[1; 32]);

        let macaroon = Macaroon::decode(&bytes).unwrap();
        assert_eq!(macaroon.location(), None);
        assert!(macaroon.caveats().is_empty());
    }

    #[test]
    fn ignores_trailing_bytes() {
        let bytes = v2_sample();
        let mut padded = bytes.clone();
        padded.extend_from_slice(b"\n\n");

        let macaroon = Macaroon::decode(&padded).unwrap();
        assert_eq!(macaroon.encoded(), &bytes[..]);
    }

    #[test]
    fn decodes_v1() {
        let mut bytes = packet("location", b"lnd");
        bytes.extend(packet("identifier", b"id"));
        bytes.extend(packet("cid", b"ipaddr 127.0.0.1"));
        bytes.extend(packet("cid", b"third-party"));
        bytes.extend(packet("vid", b"vid"));
        bytes.extend(packet("cl", b"https://auth.example"));
        bytes.extend(packet("signature", &[9; 32]));

        let macaroon = Macaroon::decode(&bytes).unwrap();
        assert_eq!(macaroon.version(), Version::V1);
        assert_eq!(macaroon.location(), Some("lnd"));
        assert_eq!(macaroon.identifier(), b"id");
        assert_eq!(macaroon.caveats().len(), 2);
        assert!(macaroon.caveats()[0].is_first_party());
        assert!(!macaroon.caveats()[1].is_first_party());
        assert_eq!(macaroon.caveats()[1].location.as_deref(), Some("https://auth.example"));
        assert_eq!(macaroon.signature(), &[9; 32]);
    }

    #[test]
    fn v1_rejects_repeated_verification_id() {
        let mut bytes = packet("location", b"");
        bytes.extend(packet("identifier", b"id"));
        bytes.extend(packet("cid", b"c"));
        bytes.extend(packet("vid", b"a"));
        bytes.extend(packet("vid", b"b"));
        bytes.extend(packet("signature", &[9; 32]));

        assert_eq!(Macaroon::decode(&bytes), Err(DecodeError::RepeatedField("vid")));
    }

    #[test]
    fn v1_rejects_unknown_field() {
        let mut bytes = packet("location", b"");
        bytes.extend(packet("identifier", b"id"));
        bytes.extend(packet("nonsense", b"x"));

        assert_eq!(Macaroon::decode(&bytes), Err(DecodeError::UnexpectedField("nonsense".to_owned())));
    }

    #[test]
    fn rejects_bad_signature_length() {
        let mut bytes = vec![2];
        field(&mut bytes, 2, b"id");
        bytes.extend_from_slice(&[0, 0]);
        field(&mut bytes, 6, &[1; 31]);

        assert_eq!(Macaroon::decode(&bytes), Err(DecodeError::SignatureLength(31)));
    }

    #[test]
    fn rejects_fields_out_of_order() {
        let mut bytes = vec![2];
        field(&mut bytes, 2, b"id");
        field(&mut bytes, 1, b"lnd");
        bytes.push(0);

        assert_eq!(Macaroon::decode(&bytes), Err(DecodeError::FieldsOutOfOrder));
    }

    #[test]
    fn rejects_location_in_first_party_caveat() {
        let mut bytes = vec![2];
        field(&mut bytes, 2, b"id");
        bytes.push(0);
        field(&mut bytes, 1, b"somewhere");
        field(&mut bytes, 2, b"caveat");
        bytes.extend_from_slice(&[0, 0]);
        field(&mut bytes, 6, &[1; 32]);

        assert_eq!(Macaroon::decode(&bytes), Err(DecodeError::LocationInFirstPartyCaveat));
    }

    #[test]
    fn rejects_empty_and_unknown() {
        assert_eq!(Macaroon::decode(&[]), Err(DecodeError::Empty));
        assert_eq!(Macaroon::decode(b"\xffgarbage"), Err(DecodeError::UnknownFormat));
        assert!(Macaroon::decode(&[0xde, 0xad, 0xbe]).is_err());
    }

    #[test]
    fn debug_hides_signature() {
        let macaroon = Macaroon::decode(&v2_sample()).unwrap();
        let debug = format!("{:?}", macaroon);
        assert!(debug.contains("lnd"));
        assert!(!debug.contains(&hex::encode([7; 32])));
        assert!(!debug.contains("[7, 7"));
    }

    proptest! {
        #[test]
        fn three_bytes_never_decode(bytes in any::<[u8; 3]>()) {
            prop_assert!(Macaroon::decode(&bytes).is_err());
        }
    }
}
