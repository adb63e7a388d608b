//! Minimal OSC 1.0 codec: exactly the subset the engine speaks.
//!
//! One datagram carries one message: an address pattern, a type tag
//! string, and positional arguments, everything padded to four bytes.
//! Supported tags are `i` (big-endian i32), `f` (big-endian f32), `s`
//! (NUL-terminated padded string), and `b` (length-prefixed padded blob).
//! Bundles are not interpreted; the decoder reports them as such so the
//! receiver can warn once and move on. Decoding never panics: every
//! malformed shape maps to a typed error.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
}

impl OscArg {
    fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Str(_) => b's',
            OscArg::Blob(_) => b'b',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OscError {
    #[error("datagram ends mid-field")]
    Truncated,
    #[error("address must start with '/'")]
    BadAddress,
    #[error("bundles are not supported")]
    Bundle,
    #[error("type tag string must start with ','")]
    BadTypeTags,
    #[error("unsupported type tag '{0}'")]
    UnsupportedTag(char),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("blob length {0} exceeds the datagram")]
    BadBlobLength(i32),
}

/// Round `n` up to the next multiple of four.
fn padded(n: usize) -> usize {
    n.div_ceil(4) * 4
}

fn push_padded_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    // At least one NUL terminator, then out to the 4-byte boundary.
    let pad = padded(s.len() + 1) - s.len();
    out.extend(std::iter::repeat_n(0u8, pad));
}

impl OscMessage {
    /// Serialize into one datagram payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.args.len() * 8);
        push_padded_str(&mut out, &self.address);
        let mut tags = Vec::with_capacity(self.args.len() + 1);
        tags.push(b',');
        tags.extend(self.args.iter().map(OscArg::tag));
        let tags = String::from_utf8(tags).expect("tags are ASCII");
        push_padded_str(&mut out, &tags);
        for arg in &self.args {
            match arg {
                OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(s) => push_padded_str(&mut out, s),
                OscArg::Blob(data) => {
                    out.extend_from_slice(&(data.len() as i32).to_be_bytes());
                    out.extend_from_slice(data);
                    let pad = padded(data.len()) - data.len();
                    out.extend(std::iter::repeat_n(0u8, pad));
                }
            }
        }
        out
    }

    /// Parse one datagram payload.
    pub fn decode(buf: &[u8]) -> Result<OscMessage, OscError> {
        let mut cursor = Cursor { buf, pos: 0 };
        let address = cursor.read_padded_str()?;
        if address == "#bundle" {
            return Err(OscError::Bundle);
        }
        if !address.starts_with('/') {
            return Err(OscError::BadAddress);
        }
        // OSC 1.0 tolerates a missing type tag string for bare messages.
        if cursor.exhausted() {
            return Ok(OscMessage::new(address, Vec::new()));
        }
        let tags = cursor.read_padded_str()?;
        let Some(tags) = tags.strip_prefix(',') else {
            return Err(OscError::BadTypeTags);
        };
        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            args.push(match tag {
                'i' => OscArg::Int(cursor.read_i32()?),
                'f' => OscArg::Float(f32::from_be_bytes(cursor.read_i32()?.to_be_bytes())),
                's' => OscArg::Str(cursor.read_padded_str()?),
                'b' => OscArg::Blob(cursor.read_blob()?),
                other => return Err(OscError::UnsupportedTag(other)),
            });
        }
        Ok(OscMessage::new(address, args))
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_padded_str(&mut self) -> Result<String, OscError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(OscError::Truncated)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| OscError::InvalidUtf8)?;
        let consumed = padded(nul + 1);
        if consumed > rest.len() {
            return Err(OscError::Truncated);
        }
        self.pos += consumed;
        Ok(s.to_string())
    }

    fn read_i32(&mut self) -> Result<i32, OscError> {
        let end = self.pos + 4;
        if end > self.buf.len() {
            return Err(OscError::Truncated);
        }
        let bytes: [u8; 4] = self.buf[self.pos..end].try_into().expect("4-byte slice");
        self.pos = end;
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, OscError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(OscError::BadBlobLength(len));
        }
        let len_usize = len as usize;
        let end = self.pos + len_usize;
        if end > self.buf.len() {
            return Err(OscError::BadBlobLength(len));
        }
        let data = self.buf[self.pos..end].to_vec();
        let consumed = padded(len_usize);
        if self.pos + consumed > self.buf.len() && len_usize % 4 != 0 {
            return Err(OscError::Truncated);
        }
        self.pos += consumed;
        Ok(data)
    }
}
