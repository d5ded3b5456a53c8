#![no_main]

use libfuzzer_sys::fuzz_target;
use pgp_envelope::composed::{PublicKeyRing, SecretKeyRing};
use pgp_envelope::packet::PacketParser;

fuzz_target!(|data: &[u8]| {
    for packet in PacketParser::new(data) {
        let _ = packet;
    }

    let _ = PublicKeyRing::from_bytes(data);
    let _ = SecretKeyRing::from_bytes(data);
});
