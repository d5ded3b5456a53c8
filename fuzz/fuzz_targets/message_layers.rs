#![no_main]

use std::io::sink;

use libfuzzer_sys::fuzz_target;
use pgp_envelope::composed::Message;

// walks compressed layers down to the literal data, without decryption
fuzz_target!(|data: &[u8]| {
    let Ok(mut message) = Message::from_reader(data) else {
        return;
    };
    for _ in 0..pgp_envelope::composed::MAX_NESTING {
        match message {
            Message::Compressed { .. } => match message.decompress() {
                Ok(inner) => message = inner,
                Err(_) => return,
            },
            Message::Literal { .. } => {
                let _ = message.write_literal(&mut sink());
                return;
            }
            _ => return,
        }
    }
});
