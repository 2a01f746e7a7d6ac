#![no_main]

use libfuzzer_sys::fuzz_target;

use bap_transactions::Transaction;

// Arbitrary bytes through the decoder and the extractor must never panic.
// Whatever decodes must survive an encode/decode cycle unchanged.
fuzz_target!(|data: &[u8]| {
    let Ok(tx) = Transaction::decode(data) else {
        return;
    };
    assert_eq!(Transaction::decode(&tx.encode()).as_ref(), Ok(&tx));
    let extraction = bap_protocol::scan(&tx);
    assert_eq!(bap_protocol::extract(&tx), extraction.pairs);
});
