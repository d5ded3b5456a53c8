#![no_main]

use std::io::Read;

use buffer_redux::BufReader;
use libfuzzer_sys::fuzz_target;
use pgp_envelope::armor::Dearmor;

fuzz_target!(|data: &[u8]| {
    let mut dearmor = Dearmor::new(BufReader::new(data));
    let mut bytes = Vec::new();
    let _ = dearmor.read_to_end(&mut bytes);
});
