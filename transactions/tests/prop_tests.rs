use proptest::prelude::*;

use bap_transactions::{split_tapes, Transaction};

proptest! {
    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Transaction::decode(&bytes);
    }

    /// Arbitrary scripts never panic the tape splitter.
    #[test]
    fn split_never_panics(mut script in prop::collection::vec(any::<u8>(), 0..256)) {
        script.insert(0, 0x6a);
        let _ = split_tapes(&script);
    }

    /// Whatever decodes re-encodes to the same bytes.
    #[test]
    fn decoded_transactions_reencode(cells in prop::collection::vec(
        prop::collection::vec(any::<u8>(), 1..100), 1..8)
    ) {
        let tape = bap_transactions::Tape::new(cells);
        let tx = Transaction::with_data_outputs(&[vec![tape]]);
        let raw = tx.encode();
        let decoded = Transaction::decode(&raw).unwrap();
        prop_assert_eq!(decoded.encode(), raw);
    }
}
