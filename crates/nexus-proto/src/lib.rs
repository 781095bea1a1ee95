//! Wire codec for the HBP/HomeBrew-style DMR repeater protocol.
//!
//! Every message has a fixed total datagram length (enforced at decode time)
//! except `RPTC`, whose length contract is a documented minimum — see the
//! note on [`message::Rptc`].

mod error;
mod message;
mod tags;
mod util;

pub use error::{LengthExpectation, ParseError};
pub use message::{
    CallType, Dmrd, FrameClass, Inbound, MstCl, MstNak, MstPong, Outbound, RptAck, Rptc, Rptcl,
    Rptk, RptPing, Rptl, Timeslot, SLOT_TYPE_VOICE_HEADER, SLOT_TYPE_VOICE_TERMINATOR,
};
pub use tags::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dmrd() -> Dmrd {
        Dmrd {
            sequence: 7,
            source_id: 312_000,
            destination_id: 7000,
            repeater_id: 312_100,
            timeslot: Timeslot::Two,
            call_type: CallType::Group,
            frame_class: FrameClass::DataSync,
            dtype_or_vseq: SLOT_TYPE_VOICE_HEADER,
            stream_id: 42,
            payload: [0xAB; 33],
        }
    }

    #[test]
    fn dmrd_round_trip() {
        let m = sample_dmrd();
        let bytes = m.encode();
        assert_eq!(bytes.len(), DMRD_LEN);
        let decoded = Dmrd::decode(&bytes).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn dmrd_wrong_length_is_rejected() {
        let mut bytes = sample_dmrd().encode();
        bytes.truncate(DMRD_LEN - 1);
        let err = Dmrd::decode(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::WrongLength { .. }));
    }

    #[test]
    fn dmrd_flags_byte_is_bit_exact() {
        let mut m = sample_dmrd();
        m.timeslot = Timeslot::One;
        m.call_type = CallType::Unit;
        m.frame_class = FrameClass::Voice;
        m.dtype_or_vseq = 0b0101;
        let bytes = m.encode();
        // flags byte is at offset 15: tag(4)+seq(1)+src(3)+dst(3)+rep(4)
        assert_eq!(bytes[15], 0b0100_0101);
        assert_eq!(Dmrd::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn voice_terminator_detection() {
        let mut m = sample_dmrd();
        m.frame_class = FrameClass::DataSync;
        m.dtype_or_vseq = SLOT_TYPE_VOICE_TERMINATOR;
        assert!(m.is_voice_terminator());
        assert!(!m.is_voice_header());
    }

    #[test]
    fn rptl_round_trip() {
        let m = Rptl { peer_id: 312_000 };
        let bytes = m.encode();
        assert_eq!(bytes.len(), RPTL_LEN);
        assert_eq!(Rptl::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn rptk_round_trip() {
        let m = Rptk {
            peer_id: 312_000,
            digest: [0x42; 32],
        };
        let bytes = m.encode();
        assert_eq!(bytes.len(), RPTK_LEN);
        assert_eq!(Rptk::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn rptc_round_trip_with_short_description() {
        let m = Rptc {
            peer_id: 312_000,
            callsign: "W1ABC".into(),
            rx_freq: "449000000".into(),
            tx_freq: "444000000".into(),
            tx_power: "25".into(),
            color_code: "01".into(),
            latitude: "42.0000".into(),
            longitude: "-71.0000".into(),
            height: "30".into(),
            location: "Boston, MA".into(),
            description: "Repeater".into(),
            url: "https://example.org".into(),
            software_id: "dmr-nexus".into(),
            package_id: "20260101".into(),
            tail: String::new(),
        };
        let bytes = m.encode();
        assert_eq!(bytes.len(), tags::RPTC_MIN_LEN);
        let decoded = Rptc::decode(&bytes).unwrap();
        assert_eq!(decoded.callsign, "W1ABC");
        assert_eq!(decoded.description, "Repeater");
    }

    #[test]
    fn rptc_tail_carries_options_overflowing_description() {
        let mut m = Rptc {
            peer_id: 312_000,
            callsign: "W1ABC".into(),
            rx_freq: "449000000".into(),
            tx_freq: "444000000".into(),
            tx_power: "25".into(),
            color_code: "01".into(),
            latitude: "0".into(),
            longitude: "0".into(),
            height: "0".into(),
            location: "".into(),
            description: "Repeater |".into(),
            url: "".into(),
            software_id: "".into(),
            package_id: "".into(),
            tail: String::new(),
        };
        m.tail = " OPTIONS: TS1=3100,3101;TS2=91;AUTO=300".into();
        let bytes = m.encode();
        assert!(bytes.len() >= tags::RPTC_MIN_LEN);
        let decoded = Rptc::decode(&bytes).unwrap();
        assert!(decoded.tail.contains("OPTIONS:"));
    }

    #[test]
    fn rptc_rejects_datagrams_shorter_than_minimum() {
        let bytes = vec![0u8; tags::RPTC_MIN_LEN - 1];
        let err = Rptc::decode(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::WrongLength { .. }));
    }

    #[test]
    fn rptping_round_trip() {
        let m = RptPing { peer_id: 312_000 };
        let bytes = m.encode();
        assert_eq!(bytes.len(), RPTPING_LEN);
        assert_eq!(RptPing::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn rptcl_round_trip() {
        let m = Rptcl { peer_id: 312_000 };
        let bytes = m.encode();
        assert_eq!(bytes.len(), RPTCL_LEN);
        assert_eq!(Rptcl::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn server_messages_round_trip() {
        let ack = RptAck { context: 0xDEAD_BEEF };
        assert_eq!(RptAck::decode(&ack.encode()).unwrap(), ack);

        let nak = MstNak { peer_id: 312_000 };
        assert_eq!(MstNak::decode(&nak.encode()).unwrap(), nak);

        let pong = MstPong { peer_id: 312_000 };
        assert_eq!(MstPong::decode(&pong.encode()).unwrap(), pong);

        let cl = MstCl { peer_id: 312_000 };
        assert_eq!(MstCl::decode(&cl.encode()).unwrap(), cl);
    }

    #[test]
    fn inbound_dispatch_picks_the_right_variant() {
        let rptl = Rptl { peer_id: 1 }.encode();
        assert!(matches!(Inbound::decode(&rptl).unwrap(), Inbound::Rptl(_)));

        let dmrd = sample_dmrd().encode();
        assert!(matches!(Inbound::decode(&dmrd).unwrap(), Inbound::Dmrd(_)));

        let ping = RptPing { peer_id: 1 }.encode();
        assert!(matches!(Inbound::decode(&ping).unwrap(), Inbound::RptPing(_)));
    }

    #[test]
    fn unrecognized_tag_is_rejected() {
        let err = Inbound::decode(b"XXXXXXXX").unwrap_err();
        assert_eq!(err, ParseError::BadTag);
    }
}
