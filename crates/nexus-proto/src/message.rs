use bytes::{BufMut, BytesMut};

use crate::error::{LengthExpectation, ParseError};
use crate::tags;
use crate::util::{decode_ascii_field, encode_ascii_field, read_u24_be, require_tag, write_u24_be};

/// Timeslot on the DMR air interface: one of two 30ms TDMA slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timeslot {
    One,
    Two,
}

impl Timeslot {
    pub fn from_bit(ts2: bool) -> Self {
        if ts2 {
            Timeslot::Two
        } else {
            Timeslot::One
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Timeslot::One => 1,
            Timeslot::Two => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallType {
    Group,
    Unit,
}

/// DMR slot-type / frame-type encoding carried in the DMRD flags byte.
///
/// Bits 5-4 of the flags byte distinguish three frame classes; when they
/// select `DataSync`, the low nibble (bits 3-0) further selects a slot-type
/// subtype, of which only the voice header/terminator subtypes matter to
/// this server (everything else is opaque payload to us).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    Voice,
    VoiceSync,
    DataSync,
    Unused,
}

impl FrameClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => FrameClass::Voice,
            0b01 => FrameClass::VoiceSync,
            0b10 => FrameClass::DataSync,
            _ => FrameClass::Unused,
        }
    }

    fn as_bits(self) -> u8 {
        match self {
            FrameClass::Voice => 0b00,
            FrameClass::VoiceSync => 0b01,
            FrameClass::DataSync => 0b10,
            FrameClass::Unused => 0b11,
        }
    }
}

pub const SLOT_TYPE_VOICE_HEADER: u8 = 1;
pub const SLOT_TYPE_VOICE_TERMINATOR: u8 = 2;

/// A decoded voice/data packet (`DMRD`, §4.1). The 33-byte payload is opaque
/// to everything except the codec itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dmrd {
    pub sequence: u8,
    pub source_id: u32,
    pub destination_id: u32,
    pub repeater_id: u32,
    pub timeslot: Timeslot,
    pub call_type: CallType,
    pub frame_class: FrameClass,
    /// Data-type (when `frame_class == DataSync`) or voice-sequence nibble
    /// (when `frame_class` is `Voice`/`VoiceSync`): bits 3-0 of the flags byte.
    pub dtype_or_vseq: u8,
    pub stream_id: u32,
    pub payload: [u8; 33],
}

impl Dmrd {
    pub fn is_voice_terminator(&self) -> bool {
        self.frame_class == FrameClass::DataSync && self.dtype_or_vseq == SLOT_TYPE_VOICE_TERMINATOR
    }

    pub fn is_voice_header(&self) -> bool {
        self.frame_class == FrameClass::DataSync && self.dtype_or_vseq == SLOT_TYPE_VOICE_HEADER
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::DMRD_LEN {
            return Err(ParseError::WrongLength {
                tag: "DMRD",
                expected: LengthExpectation::Exact(tags::DMRD_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::DMRD)?;

        let sequence = buf[4];
        let source_id = read_u24_be(&buf[5..8]);
        let destination_id = read_u24_be(&buf[8..11]);
        let repeater_id = u32::from_be_bytes(buf[11..15].try_into().unwrap());
        let flags = buf[15];
        let timeslot = Timeslot::from_bit(flags & 0b1000_0000 != 0);
        let call_type = if flags & 0b0100_0000 != 0 {
            CallType::Unit
        } else {
            CallType::Group
        };
        let frame_class = FrameClass::from_bits((flags & 0b0011_0000) >> 4);
        let dtype_or_vseq = flags & 0b0000_1111;
        let stream_id = u32::from_be_bytes(buf[16..20].try_into().unwrap());
        let mut payload = [0u8; 33];
        payload.copy_from_slice(&buf[20..53]);

        Ok(Dmrd {
            sequence,
            source_id,
            destination_id,
            repeater_id,
            timeslot,
            call_type,
            frame_class,
            dtype_or_vseq,
            stream_id,
            payload,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::DMRD_LEN);
        out.put_slice(tags::DMRD);
        out.put_u8(self.sequence);
        let mut id = [0u8; 3];
        write_u24_be(self.source_id, &mut id);
        out.put_slice(&id);
        write_u24_be(self.destination_id, &mut id);
        out.put_slice(&id);
        out.put_u32(self.repeater_id);

        let mut flags = self.dtype_or_vseq & 0b0000_1111;
        flags |= self.frame_class.as_bits() << 4;
        if self.call_type == CallType::Unit {
            flags |= 0b0100_0000;
        }
        if self.timeslot == Timeslot::Two {
            flags |= 0b1000_0000;
        }
        out.put_u8(flags);
        out.put_u32(self.stream_id);
        out.put_slice(&self.payload);
        debug_assert_eq!(out.len(), tags::DMRD_LEN);
        out
    }
}

/// Login request (`RPTL`, §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rptl {
    pub peer_id: u32,
}

impl Rptl {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::RPTL_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTL",
                expected: LengthExpectation::Exact(tags::RPTL_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTL)?;
        let peer_id = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        Ok(Rptl { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::RPTL_LEN);
        out.put_slice(tags::RPTL);
        out.put_u32(self.peer_id);
        out
    }
}

/// Authentication response (`RPTK`, §4.1): `peer_id` + 32-byte SHA-256 digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rptk {
    pub peer_id: u32,
    pub digest: [u8; 32],
}

impl Rptk {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::RPTK_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTK",
                expected: LengthExpectation::Exact(tags::RPTK_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTK)?;
        let peer_id = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&buf[8..40]);
        Ok(Rptk { peer_id, digest })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::RPTK_LEN);
        out.put_slice(tags::RPTK);
        out.put_u32(self.peer_id);
        out.put_slice(&self.digest);
        out
    }
}

/// Configuration (`RPTC`, §4.1).
///
/// Decoding note: the fixed ASCII fields (callsign through package id) sum
/// to 293 bytes, plus the 8-byte `RPTC`+peer-id header, for 301 bytes — one
/// short of the 302-byte total the wire table gives. The remaining byte is
/// `§4.1`'s "free-form tail that MAY carry an options sub-string" (§4.4),
/// which in real traffic is far longer than one byte (the worked example in
/// spec §8 embeds `OPTIONS: TS1=3100;TS2=91;AUTO=300` inside `description`,
/// already overflowing the nominal 19-byte field). We resolve this the
/// pragmatic way real HBP peers do: `RPTC` is the one tag whose length
/// contract is a *minimum*, not exact — any datagram of 302 bytes or more is
/// accepted, and everything from offset 301 to the end of the datagram is
/// kept as `tail` for the options parser (§4.4) to scan, in addition to the
/// fixed-width `description` field itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rptc {
    pub peer_id: u32,
    pub callsign: String,
    pub rx_freq: String,
    pub tx_freq: String,
    pub tx_power: String,
    pub color_code: String,
    pub latitude: String,
    pub longitude: String,
    pub height: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub software_id: String,
    pub package_id: String,
    /// Raw bytes from offset 301 onward (lossy-UTF8 decoded for convenience).
    pub tail: String,
}

const RPTC_FIELDS: &[(&str, usize)] = &[
    ("callsign", 8),
    ("rx_freq", 9),
    ("tx_freq", 9),
    ("tx_power", 2),
    ("color_code", 2),
    ("latitude", 8),
    ("longitude", 9),
    ("height", 3),
    ("location", 20),
    ("description", 19),
    ("url", 124),
    ("software_id", 40),
    ("package_id", 40),
];

impl Rptc {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < tags::RPTC_MIN_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTC",
                expected: LengthExpectation::AtLeast(tags::RPTC_MIN_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTC)?;
        let peer_id = u32::from_be_bytes(buf[4..8].try_into().unwrap());

        let mut offset = 8;
        let mut values: Vec<String> = Vec::with_capacity(RPTC_FIELDS.len());
        for (name, width) in RPTC_FIELDS {
            let end = offset + width;
            let field = buf
                .get(offset..end)
                .ok_or(ParseError::BadField(name))?;
            values.push(decode_ascii_field(field));
            offset = end;
        }
        let tail = String::from_utf8_lossy(&buf[offset..]).into_owned();

        let mut it = values.into_iter();
        Ok(Rptc {
            peer_id,
            callsign: it.next().unwrap(),
            rx_freq: it.next().unwrap(),
            tx_freq: it.next().unwrap(),
            tx_power: it.next().unwrap(),
            color_code: it.next().unwrap(),
            latitude: it.next().unwrap(),
            longitude: it.next().unwrap(),
            height: it.next().unwrap(),
            location: it.next().unwrap(),
            description: it.next().unwrap(),
            url: it.next().unwrap(),
            software_id: it.next().unwrap(),
            package_id: it.next().unwrap(),
            tail,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let fixed_len = RPTC_FIELDS.iter().map(|(_, w)| w).sum::<usize>();
        let mut out = BytesMut::with_capacity(8 + fixed_len + self.tail.len().max(1));
        out.put_slice(tags::RPTC);
        out.put_u32(self.peer_id);

        let values = [
            &self.callsign,
            &self.rx_freq,
            &self.tx_freq,
            &self.tx_power,
            &self.color_code,
            &self.latitude,
            &self.longitude,
            &self.height,
            &self.location,
            &self.description,
            &self.url,
            &self.software_id,
            &self.package_id,
        ];
        for ((_, width), value) in RPTC_FIELDS.iter().zip(values.iter()) {
            let mut field = vec![0u8; *width];
            encode_ascii_field(value, *width, &mut field);
            out.put_slice(&field);
        }
        if self.tail.is_empty() {
            out.put_u8(b' ');
        } else {
            out.put_slice(self.tail.as_bytes());
        }
        out
    }
}

/// Keepalive (`RPTP`/`RPTPING`, §4.1). The wire tag is the full `RPTPING`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RptPing {
    pub peer_id: u32,
}

impl RptPing {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::RPTPING_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTPING",
                expected: LengthExpectation::Exact(tags::RPTPING_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTPING)?;
        let peer_id = u32::from_be_bytes(buf[7..11].try_into().unwrap());
        Ok(RptPing { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::RPTPING_LEN);
        out.put_slice(tags::RPTPING);
        out.put_u32(self.peer_id);
        out
    }
}

/// Close/disconnect from peer (`RPTCL`, §4.1). §6 notes the peer id may be
/// padded; we encode/decode it at a fixed offset with a zero-filled gap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rptcl {
    pub peer_id: u32,
}

impl Rptcl {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::RPTCL_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTCL",
                expected: LengthExpectation::Exact(tags::RPTCL_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTCL)?;
        let peer_id = u32::from_be_bytes(buf[9..13].try_into().unwrap());
        Ok(Rptcl { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::RPTCL_LEN);
        out.put_slice(tags::RPTCL);
        out.put_bytes(0, 4);
        out.put_u32(self.peer_id);
        out
    }
}

/// Server-originated positive acknowledgement (`RPTACK`, §4.1/§6). `context`
/// is either a freshly generated nonce (replying to `RPTL`) or the peer id
/// (acknowledging `RPTK`/`RPTC`) — the caller knows which from the handshake
/// state it is replying to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RptAck {
    pub context: u32,
}

impl RptAck {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::RPTACK_LEN {
            return Err(ParseError::WrongLength {
                tag: "RPTACK",
                expected: LengthExpectation::Exact(tags::RPTACK_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::RPTACK)?;
        let context = u32::from_be_bytes(buf[6..10].try_into().unwrap());
        Ok(RptAck { context })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::RPTACK_LEN);
        out.put_slice(tags::RPTACK);
        out.put_u32(self.context);
        out
    }
}

/// Negative acknowledgement (`MSTNAK`, §4.1/§6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MstNak {
    pub peer_id: u32,
}

impl MstNak {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::MSTNAK_LEN {
            return Err(ParseError::WrongLength {
                tag: "MSTNAK",
                expected: LengthExpectation::Exact(tags::MSTNAK_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::MSTNAK)?;
        let peer_id = u32::from_be_bytes(buf[6..10].try_into().unwrap());
        Ok(MstNak { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::MSTNAK_LEN);
        out.put_slice(tags::MSTNAK);
        out.put_u32(self.peer_id);
        out
    }
}

/// Keepalive reply (`MSTPONG`, §4.1/§6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MstPong {
    pub peer_id: u32,
}

impl MstPong {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::MSTPONG_LEN {
            return Err(ParseError::WrongLength {
                tag: "MSTPONG",
                expected: LengthExpectation::Exact(tags::MSTPONG_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::MSTPONG)?;
        let peer_id = u32::from_be_bytes(buf[7..11].try_into().unwrap());
        Ok(MstPong { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::MSTPONG_LEN);
        out.put_slice(tags::MSTPONG);
        out.put_u32(self.peer_id);
        out
    }
}

/// Server-initiated close (`MSTCL`, §4.1/§6); same layout as `RPTCL`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MstCl {
    pub peer_id: u32,
}

impl MstCl {
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != tags::MSTCL_LEN {
            return Err(ParseError::WrongLength {
                tag: "MSTCL",
                expected: LengthExpectation::Exact(tags::MSTCL_LEN),
                got: buf.len(),
            });
        }
        require_tag(buf, tags::MSTCL)?;
        let peer_id = u32::from_be_bytes(buf[9..13].try_into().unwrap());
        Ok(MstCl { peer_id })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(tags::MSTCL_LEN);
        out.put_slice(tags::MSTCL);
        out.put_bytes(0, 4);
        out.put_u32(self.peer_id);
        out
    }
}

/// Any decoded inbound (peer→server) message, dispatched on by tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Dmrd(Dmrd),
    Rptl(Rptl),
    Rptk(Rptk),
    Rptc(Rptc),
    RptPing(RptPing),
    Rptcl(Rptcl),
}

impl Inbound {
    /// Decodes a datagram by sniffing its leading tag bytes, longest tag first
    /// so that `RPTC`/`RPTCL`/`RPTK`/`RPTL` (which all share the `RPT` prefix)
    /// resolve unambiguously.
    pub fn decode(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.starts_with(tags::DMRD) {
            return Dmrd::decode(buf).map(Inbound::Dmrd);
        }
        if buf.starts_with(tags::RPTPING) {
            return RptPing::decode(buf).map(Inbound::RptPing);
        }
        if buf.starts_with(tags::RPTCL) {
            return Rptcl::decode(buf).map(Inbound::Rptcl);
        }
        if buf.starts_with(tags::RPTC) {
            return Rptc::decode(buf).map(Inbound::Rptc);
        }
        if buf.starts_with(tags::RPTK) {
            return Rptk::decode(buf).map(Inbound::Rptk);
        }
        if buf.starts_with(tags::RPTL) {
            return Rptl::decode(buf).map(Inbound::Rptl);
        }
        Err(ParseError::BadTag)
    }
}

/// Any outbound (server→peer) message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Dmrd(Dmrd),
    RptAck(RptAck),
    MstNak(MstNak),
    MstPong(MstPong),
    MstCl(MstCl),
}

impl Outbound {
    pub fn encode(&self) -> BytesMut {
        match self {
            Outbound::Dmrd(m) => m.encode(),
            Outbound::RptAck(m) => m.encode(),
            Outbound::MstNak(m) => m.encode(),
            Outbound::MstPong(m) => m.encode(),
            Outbound::MstCl(m) => m.encode(),
        }
    }
}
