//! Byte-level framing shared by every protocol.
//!
//! [`Connection`] is the pipe abstraction: implementors supply `read` and
//! `write`, and get the Minecraft primitive codecs (varints, big-endian fixed
//! width integers, length-prefixed UTF-8 and null-terminated Latin-1 strings,
//! nested packets) for free. [`Buffer`] is the in-memory implementation used
//! to build outgoing packets and to pick apart received ones.

use std::collections::VecDeque;

use crate::Error;

/// The largest datagram a UDP transport will accept.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// The longest packet or string a peer may announce, the largest length a
/// three byte varint can carry.
pub const MAX_PACKET_SIZE: usize = 2_097_151;

/// A varint never takes more than this many bytes on the wire.
const MAX_VARINT_LEN: u32 = 5;

/// Accumulates a varint one byte at a time.
///
/// Both the blocking and the async connections feed bytes through this, so
/// the bit twiddling lives in one place.
#[derive(Debug, Default)]
pub(crate) struct VarIntDecoder {
    value: u32,
    position: u32,
}

impl VarIntDecoder {
    /// Feed the next byte, returning the value once the terminating byte
    /// (continuation bit clear) has been seen.
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn push(&mut self, byte: u8) -> Result<Option<i32>, Error> {
        self.value |= u32::from(byte & 0x7F) << (7 * self.position);
        if byte & 0x80 == 0 {
            return Ok(Some(self.value as i32));
        }
        self.position += 1;
        if self.position >= MAX_VARINT_LEN {
            return Err(Error::VarIntTooLarge);
        }
        Ok(None)
    }
}

/// Encodes `value` as a Minecraft varint.
///
/// # Errors
/// If `value` does not fit in a 32-bit signed integer. Nothing is encoded in
/// that case.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn encode_varint(value: i64) -> Result<Vec<u8>, Error> {
    let mut remaining = i32::try_from(value)? as u32;
    let mut out = Vec::with_capacity(MAX_VARINT_LEN as usize);
    loop {
        if remaining & !0x7F == 0 {
            out.push(remaining as u8);
            return Ok(out);
        }
        out.push((remaining & 0x7F) as u8 | 0x80);
        remaining >>= 7;
    }
}

/// Decodes a varint from the front of `bytes`.
///
/// # Errors
/// If the varint runs past five bytes or `bytes` ends before it terminates.
pub fn decode_varint(bytes: &[u8]) -> Result<i32, Error> {
    let mut buffer = Buffer::from(bytes);
    buffer.read_varint()
}

/// A bidirectional byte pipe with the Minecraft primitive codecs layered on
/// top.
///
/// Socket-backed implementations block in `read` until exactly `n` bytes
/// arrived (streams) or one datagram arrived (datagram sockets).
pub trait Connection {
    /// Read `length` bytes.
    ///
    /// # Errors
    /// If the bytes cannot be produced: the peer closed the stream, the read
    /// timed out, or an in-memory buffer ran dry.
    fn read(&mut self, length: usize) -> Result<Vec<u8>, Error>;

    /// Write all of `data`.
    ///
    /// # Errors
    /// If the transport fails or times out.
    fn write(&mut self, data: &[u8]) -> Result<(), Error>;

    /// How many received bytes are waiting to be read.
    ///
    /// # Errors
    /// Socket connections are pass-through pipes and do not support this.
    fn remaining(&self) -> Result<usize, Error> {
        Err(Error::Unsupported("remaining"))
    }

    /// Take everything written so far.
    ///
    /// # Errors
    /// Socket connections are pass-through pipes and do not support this.
    fn flush(&mut self) -> Result<Vec<u8>, Error> {
        Err(Error::Unsupported("flush"))
    }

    /// Read one whole datagram.
    ///
    /// In-memory buffers hand back everything they hold.
    ///
    /// # Errors
    /// See [`Connection::read`].
    fn read_datagram(&mut self) -> Result<Vec<u8>, Error> {
        self.read(MAX_DATAGRAM_SIZE)
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_u8(&mut self) -> Result<u8, Error> {
        self.read(1)?
            .first()
            .copied()
            .ok_or(Error::ConnectionClosed)
    }

    /// # Errors
    /// If the varint is longer than five bytes, or the read fails.
    fn read_varint(&mut self) -> Result<i32, Error> {
        let mut decoder = VarIntDecoder::default();
        loop {
            if let Some(value) = decoder.push(self.read_u8()?)? {
                return Ok(value);
            }
        }
    }

    /// Writes `value` as a varint. Values outside the 32-bit signed range are
    /// rejected before anything is written.
    ///
    /// # Errors
    /// If `value` is out of range or the write fails.
    fn write_varint(&mut self, value: i64) -> Result<(), Error> {
        let encoded = encode_varint(value)?;
        self.write(&encoded)
    }

    /// Reads a varint-length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// If the length is negative or above [`MAX_PACKET_SIZE`], the bytes are
    /// not UTF-8, or the read fails.
    fn read_utf(&mut self) -> Result<String, Error> {
        let length = checked_length(self.read_varint()?, "string")?;
        let bytes = self.read(length)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::InvalidPacket("string was not valid UTF-8".into()))
    }

    /// # Errors
    /// If the string is too long for a varint prefix, or the write fails.
    fn write_utf(&mut self, value: &str) -> Result<(), Error> {
        self.write_varint(i64::try_from(value.len())?)?;
        self.write(value.as_bytes())
    }

    /// Reads a null-terminated string, one Latin-1 character per byte.
    ///
    /// The mapping is lossless: every byte becomes the `char` with the same
    /// code point, so servers that stuff UTF-8 in here come out as mojibake
    /// rather than an error.
    ///
    /// # Errors
    /// If the read fails before a terminator is found.
    fn read_ascii(&mut self) -> Result<String, Error> {
        let mut result = String::new();
        loop {
            match self.read_u8()? {
                0 => return Ok(result),
                byte => result.push(char::from(byte)),
            }
        }
    }

    /// Writes `value` as Latin-1 followed by a null terminator.
    ///
    /// # Errors
    /// If `value` holds characters outside Latin-1, or the write fails.
    fn write_ascii(&mut self, value: &str) -> Result<(), Error> {
        let mut bytes = value
            .chars()
            .map(|c| u8::try_from(u32::from(c)))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidValue(format!("`{value}` is not Latin-1")))?;
        bytes.push(0);
        self.write(&bytes)
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_short(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_short(&mut self, value: i16) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_ushort(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_ushort(&mut self, value: u16) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_int(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_int(&mut self, value: i32) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_uint(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_uint(&mut self, value: u32) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_long(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_long(&mut self, value: i64) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// # Errors
    /// See [`Connection::read`].
    fn read_ulong(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(read_array(self)?))
    }

    /// # Errors
    /// See [`Connection::write`].
    fn write_ulong(&mut self, value: u64) -> Result<(), Error> {
        self.write(&value.to_be_bytes())
    }

    /// Reads a varint-length-prefixed packet into its own [`Buffer`].
    ///
    /// # Errors
    /// If the length is negative or above [`MAX_PACKET_SIZE`], or the read
    /// fails.
    fn read_buffer(&mut self) -> Result<Buffer, Error> {
        let length = checked_length(self.read_varint()?, "packet")?;
        let mut packet = Buffer::new();
        packet.receive(&self.read(length)?);
        Ok(packet)
    }

    /// Flushes `packet` and writes it with a varint length prefix, as a single
    /// write.
    ///
    /// # Errors
    /// If the packet is too long for a varint prefix, or the write fails.
    fn write_buffer(&mut self, packet: &mut Buffer) -> Result<(), Error> {
        let framed = frame(packet)?;
        self.write(&framed)
    }
}

/// Validates a length prefix before anything is allocated for it.
pub(crate) fn checked_length(length: i32, what: &str) -> Result<usize, Error> {
    usize::try_from(length)
        .ok()
        .filter(|&length| length <= MAX_PACKET_SIZE)
        .ok_or_else(|| Error::InvalidPacket(format!("{what} length {length} out of range")))
}

fn read_array<C: Connection + ?Sized, const N: usize>(conn: &mut C) -> Result<[u8; N], Error> {
    let bytes = conn.read(N)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| Error::Underflow {
        requested: N,
        available: bytes.len(),
    })
}

/// Drains `packet` and prepends its length as a varint.
pub(crate) fn frame(packet: &mut Buffer) -> Result<Vec<u8>, Error> {
    let data = packet.take_sent();
    let mut framed = encode_varint(i64::try_from(data.len())?)?;
    framed.extend_from_slice(&data);
    Ok(framed)
}

/// An in-memory [`Connection`]: writes append to an outbound queue, reads
/// consume from the front of a separate inbound queue.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Buffer {
    sent: Vec<u8>,
    received: VecDeque<u8>,
}

impl Buffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent: Vec::new(),
            received: VecDeque::new(),
        }
    }

    /// Append bytes to the inbound queue.
    pub fn receive(&mut self, data: &[u8]) {
        self.received.extend(data);
    }

    /// The bytes written so far, without draining them.
    #[must_use]
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub(crate) fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }

    pub(crate) fn take_received(&mut self) -> Vec<u8> {
        self.received.drain(..).collect()
    }

    /// Discard `length` inbound bytes.
    ///
    /// # Errors
    /// If fewer than `length` bytes are buffered.
    pub fn skip(&mut self, length: usize) -> Result<(), Error> {
        Connection::read(self, length).map(drop)
    }
}

impl From<&[u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.receive(data);
        buffer
    }
}

impl Connection for Buffer {
    fn read(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        if self.received.len() < length {
            return Err(Error::Underflow {
                requested: length,
                available: self.received.len(),
            });
        }
        Ok(self.received.drain(..length).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.sent.extend_from_slice(data);
        Ok(())
    }

    fn remaining(&self) -> Result<usize, Error> {
        Ok(self.received.len())
    }

    fn flush(&mut self) -> Result<Vec<u8>, Error> {
        Ok(self.take_sent())
    }

    fn read_datagram(&mut self) -> Result<Vec<u8>, Error> {
        Ok(self.take_received())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn flush_drains_sent_bytes() {
        let mut buffer = Buffer::new();
        buffer.write(&hex("7F")).unwrap();
        buffer.write(&hex("AABB")).unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("7FAABB"));
        assert!(buffer.flush().unwrap().is_empty());
    }

    #[test]
    fn reads_consume_from_the_front() {
        let mut buffer = Buffer::new();
        buffer.receive(&hex("7F"));
        buffer.receive(&hex("AABB"));
        assert_eq!(buffer.remaining().unwrap(), 3);
        assert_eq!(buffer.read(2).unwrap(), hex("7FAA"));
        assert_eq!(buffer.read(1).unwrap(), hex("BB"));
        assert_eq!(buffer.remaining().unwrap(), 0);
    }

    #[test]
    fn short_read_underflows_without_consuming() {
        let mut buffer = Buffer::from(&hex("AABB")[..]);
        let err = buffer.read(3).unwrap_err();
        assert!(matches!(
            err,
            Error::Underflow {
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(buffer.remaining().unwrap(), 2);
    }

    #[test]
    fn varint_known_encodings() {
        assert_eq!(encode_varint(0).unwrap(), hex("00"));
        assert_eq!(encode_varint(15).unwrap(), hex("0F"));
        assert_eq!(encode_varint(-1).unwrap(), hex("FFFFFFFF0F"));
        assert_eq!(encode_varint(2_147_483_647).unwrap(), hex("FFFFFFFF07"));
        assert_eq!(encode_varint(-2_147_483_648).unwrap(), hex("8080808008"));
    }

    #[test]
    fn varint_round_trips_across_the_range() {
        for value in [
            i32::MIN,
            i32::MIN + 1,
            -300,
            -1,
            0,
            1,
            127,
            128,
            255,
            25565,
            2_097_151,
            i32::MAX,
        ] {
            let encoded = encode_varint(i64::from(value)).unwrap();
            assert_eq!(decode_varint(&encoded).unwrap(), value, "{value}");
        }
    }

    #[test]
    fn varint_out_of_range_writes_nothing() {
        let mut buffer = Buffer::new();
        let err = buffer.write_varint(34_359_738_368).unwrap_err();
        assert!(matches!(err, Error::InvalidVarInt(_)));
        assert!(buffer.write_varint(i64::from(i32::MIN) - 1).is_err());
        assert!(buffer.flush().unwrap().is_empty());
    }

    #[test]
    fn varint_with_too_many_continuation_bytes() {
        let err = decode_varint(&hex("FFFFFFFF80")).unwrap_err();
        assert!(matches!(err, Error::VarIntTooLarge));
    }

    #[test]
    fn varint_truncated_input() {
        assert!(matches!(
            decode_varint(&hex("FF")),
            Err(Error::Underflow { .. })
        ));
    }

    #[test]
    fn utf_strings() {
        let mut buffer = Buffer::from(&hex("0D48656C6C6F2C20776F726C6421")[..]);
        assert_eq!(buffer.read_utf().unwrap(), "Hello, world!");

        buffer.write_utf("Hello, world!").unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("0D48656C6C6F2C20776F726C6421"));

        buffer.write_utf("").unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("00"));
    }

    #[test]
    fn utf_length_counts_bytes() {
        let mut buffer = Buffer::new();
        buffer.write_utf("§a").unwrap();
        let sent = buffer.flush().unwrap();
        assert_eq!(sent, [&[3_u8][..], "§a".as_bytes()].concat());

        buffer.receive(&sent);
        assert_eq!(buffer.read_utf().unwrap(), "§a");
    }

    #[test]
    fn long_utf_round_trip() {
        let text = "ab€".repeat(10_000);
        let mut buffer = Buffer::new();
        buffer.write_utf(&text).unwrap();
        let sent = buffer.flush().unwrap();
        buffer.receive(&sent);
        assert_eq!(buffer.read_utf().unwrap(), text);
    }

    #[test]
    fn ascii_strings() {
        let mut buffer = Buffer::from(&hex("48656C6C6F2C20776F726C642100")[..]);
        assert_eq!(buffer.read_ascii().unwrap(), "Hello, world!");

        buffer.write_ascii("Hello, world!").unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("48656C6C6F2C20776F726C642100"));

        buffer.write_ascii("").unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("00"));
    }

    #[test]
    fn ascii_read_never_fails_on_high_bytes() {
        let mut buffer = Buffer::from(&hex("E282AC00")[..]);
        let text = buffer.read_ascii().unwrap();
        assert_eq!(text.chars().count(), 3);
        assert_eq!(text.chars().map(u32::from).collect::<Vec<_>>(), [0xE2, 0x82, 0xAC]);
    }

    #[test]
    fn ascii_write_rejects_wide_chars() {
        let mut buffer = Buffer::new();
        assert!(buffer.write_ascii("€").is_err());
    }

    #[test]
    fn fixed_width_integers() {
        let mut buffer = Buffer::from(&hex("8000")[..]);
        assert_eq!(buffer.read_short().unwrap(), -32768);
        buffer.receive(&hex("7FFF"));
        assert_eq!(buffer.read_short().unwrap(), 32767);
        buffer.receive(&hex("8000"));
        assert_eq!(buffer.read_ushort().unwrap(), 32768);
        buffer.receive(&hex("80000000"));
        assert_eq!(buffer.read_int().unwrap(), -2_147_483_648);
        buffer.receive(&hex("80000000"));
        assert_eq!(buffer.read_uint().unwrap(), 2_147_483_648);
        buffer.receive(&hex("8000000000000000"));
        assert_eq!(buffer.read_long().unwrap(), i64::MIN);
        buffer.receive(&hex("8000000000000000"));
        assert_eq!(buffer.read_ulong().unwrap(), 9_223_372_036_854_775_808);

        buffer.write_short(-32768).unwrap();
        buffer.write_ushort(32768).unwrap();
        buffer.write_int(2_147_483_647).unwrap();
        buffer.write_uint(4_294_967_295).unwrap();
        buffer.write_long(9_223_372_036_854_775_807).unwrap();
        buffer.write_ulong(18_446_744_073_709_551_615).unwrap();
        assert_eq!(
            buffer.flush().unwrap(),
            hex("800080007FFFFFFFFFFFFFFF7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF")
        );
    }

    #[test]
    fn nested_buffers() {
        let mut buffer = Buffer::from(&hex("027FAA")[..]);
        let mut packet = buffer.read_buffer().unwrap();
        assert_eq!(packet.read(2).unwrap(), hex("7FAA"));
        assert_eq!(buffer.remaining().unwrap(), 0);

        let mut packet = Buffer::new();
        packet.write(&hex("7FAA")).unwrap();
        buffer.write_buffer(&mut packet).unwrap();
        assert_eq!(buffer.flush().unwrap(), hex("027FAA"));
        assert!(packet.sent().is_empty());
    }

    #[test]
    fn nested_buffer_only_takes_its_length() {
        let mut buffer = Buffer::from(&hex("017F01AA")[..]);
        let mut first = buffer.read_buffer().unwrap();
        assert_eq!(first.remaining().unwrap(), 1);
        assert_eq!(first.read_u8().unwrap(), 0x7F);
        let mut second = buffer.read_buffer().unwrap();
        assert_eq!(second.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn oversized_lengths_are_rejected() {
        let mut buffer = Buffer::from(&hex("FFFFFFFF07")[..]);
        assert!(matches!(buffer.read_buffer(), Err(Error::InvalidPacket(_))));

        let mut buffer = Buffer::from(&hex("FFFFFFFF07")[..]);
        assert!(matches!(buffer.read_utf(), Err(Error::InvalidPacket(_))));

        let mut buffer = Buffer::from(&hex("808080800F")[..]);
        assert!(matches!(buffer.read_buffer(), Err(Error::InvalidPacket(_))));

        assert_eq!(checked_length(2_097_151, "packet").unwrap(), MAX_PACKET_SIZE);
        assert!(checked_length(2_097_152, "packet").is_err());
    }

    #[test]
    fn datagram_read_drains_everything() {
        let mut buffer = Buffer::from(&hex("0102030405")[..]);
        buffer.skip(1).unwrap();
        assert_eq!(buffer.read_datagram().unwrap(), hex("02030405"));
        assert_eq!(buffer.remaining().unwrap(), 0);
    }
}
