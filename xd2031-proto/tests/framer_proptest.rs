//! Property tests for the packet framer: reassembly must not depend on how
//! the input stream happens to be chunked, and sync bytes must always be
//! echoed one-for-one.

use proptest::prelude::*;
use xd2031_proto::framer::{Framer, FramerEvent};
use xd2031_proto::packet::{Command, Packet};

fn arb_packet() -> impl Strategy<Value = Packet> {
    (
        prop_oneof![
            Just(Command::Read),
            Just(Command::Write),
            Just(Command::Close),
            Just(Command::OpenRd),
        ],
        any::<u8>(),
        proptest::collection::vec(any::<u8>(), 0..200),
    )
        .prop_map(|(cmd, channel, payload)| Packet::new(cmd, channel, payload))
}

fn drain(framer: &mut Framer) -> Vec<Packet> {
    let mut out = Vec::new();
    loop {
        match framer.poll() {
            FramerEvent::Packet(p) => out.push(p),
            FramerEvent::Sync => {}
            FramerEvent::NeedMore => break,
        }
    }
    out
}

proptest! {
    /// Feeding a stream of packets in one shot or split into arbitrary
    /// chunk sizes must yield the same decoded packets in the same order.
    #[test]
    fn reassembly_is_independent_of_chunking(
        packets in proptest::collection::vec(arb_packet(), 1..8),
        chunk_size in 1usize..11,
    ) {
        let mut whole = Vec::new();
        for p in &packets {
            whole.extend(p.encode());
        }

        let mut one_shot = Framer::new();
        one_shot.feed(&whole);
        let one_shot_out = drain(&mut one_shot);

        let mut chunked = Framer::new();
        let mut chunked_out = Vec::new();
        for chunk in whole.chunks(chunk_size) {
            chunked.feed(chunk);
            drain_into(&mut chunked, &mut chunked_out);
        }
        drain_into(&mut chunked, &mut chunked_out);

        prop_assert_eq!(one_shot_out, chunked_out);
    }

    /// Every sync byte fed in produces exactly one `Sync` event, regardless
    /// of what surrounds it.
    #[test]
    fn sync_bytes_are_echoed_one_for_one(n in 0usize..40) {
        let mut framer = Framer::new();
        framer.feed(&vec![0u8; n]);
        let mut syncs = 0;
        loop {
            match framer.poll() {
                FramerEvent::Sync => syncs += 1,
                FramerEvent::NeedMore => break,
                FramerEvent::Packet(_) => unreachable!("zero bytes cannot decode to a packet"),
            }
        }
        prop_assert_eq!(syncs, n);
    }
}

fn drain_into(framer: &mut Framer, sink: &mut Vec<Packet>) {
    loop {
        match framer.poll() {
            FramerEvent::Packet(p) => sink.push(p),
            FramerEvent::Sync => {}
            FramerEvent::NeedMore => break,
        }
    }
}
