#![no_main]

use libfuzzer_sys::fuzz_target;

use bap_transactions::split_tapes;

// Treat the input as an output script and decode every tape as both BAP
// and AIP.
fuzz_target!(|data: &[u8]| {
    let Ok(tapes) = split_tapes(data) else {
        return;
    };
    for (i, tape) in tapes.iter().enumerate() {
        let _ = bap_protocol::decode_bap(tape);
        let _ = bap_protocol::decode_aip(tape, &tapes[..i]);
    }
});
