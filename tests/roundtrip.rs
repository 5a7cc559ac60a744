use std::io::Cursor;

use proptest::prelude::*;
use rdelta::{
    apply_patch, build_delta, build_match_index, build_signature, load_signature, BufferSizes,
    SignatureFormat, SignatureOptions, Stats,
};

fn signature_bytes(basis: &[u8], options: &SignatureOptions, sizes: BufferSizes) -> Vec<u8> {
    let mut sig = Vec::new();
    build_signature(&mut &basis[..], &mut sig, options, sizes).unwrap();
    sig
}

fn delta_bytes(sig: &[u8], new: &[u8], sizes: BufferSizes) -> (Vec<u8>, Stats) {
    let (signature, _) = load_signature(&mut &sig[..], sizes).unwrap();
    let index = build_match_index(signature).unwrap();
    let mut delta = Vec::new();
    let stats = build_delta(&index, &mut &new[..], &mut delta, sizes).unwrap();
    (delta, stats)
}

fn patched(basis: &[u8], delta: &[u8], sizes: BufferSizes) -> Vec<u8> {
    let mut out = Vec::new();
    apply_patch(Cursor::new(basis), &mut &delta[..], &mut out, sizes).unwrap();
    out
}

fn formats() -> impl Strategy<Value = SignatureFormat> {
    prop_oneof![
        Just(SignatureFormat::Md4),
        Just(SignatureFormat::Blake2),
        Just(SignatureFormat::RabinKarpMd4),
        Just(SignatureFormat::RabinKarpBlake2),
    ]
}

/// A basis and a new file that shares most of its content.
fn related_files() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (
        prop::collection::vec(any::<u8>(), 0..2048),
        prop::collection::vec((any::<prop::sample::Index>(), prop::collection::vec(any::<u8>(), 0..40)), 0..6),
    )
        .prop_map(|(basis, edits)| {
            let mut new = basis.clone();
            for (at, insert) in edits {
                let pos = if new.is_empty() { 0 } else { at.index(new.len()) };
                let cut = (pos + insert.len() / 2).min(new.len());
                new.splice(pos..cut, insert);
            }
            (basis, new)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn patch_reconstructs_new_file(
        (basis, new) in related_files(),
        format in formats(),
        block_len in 1u32..300,
        strong_len in 4usize..=16,
    ) {
        let options = SignatureOptions { format, block_len, strong_len };
        let sizes = BufferSizes::default();

        let sig = signature_bytes(&basis, &options, sizes);
        let (delta, stats) = delta_bytes(&sig, &new, sizes);

        prop_assert_eq!(stats.copy_bytes + stats.lit_bytes, new.len() as u64);
        prop_assert_eq!(patched(&basis, &delta, sizes), new);
    }

    #[test]
    fn unrelated_files_round_trip(
        basis in prop::collection::vec(any::<u8>(), 0..1024),
        new in prop::collection::vec(any::<u8>(), 0..1024),
        block_len in 1u32..64,
    ) {
        let options = SignatureOptions { block_len, ..SignatureOptions::default() };
        let sizes = BufferSizes::default();

        let sig = signature_bytes(&basis, &options, sizes);
        let (delta, _) = delta_bytes(&sig, &new, sizes);
        prop_assert_eq!(patched(&basis, &delta, sizes), new);
    }

    #[test]
    fn output_independent_of_buffer_sizes(
        (basis, new) in related_files(),
        block_len in 1u32..100,
        input in 1usize..17,
        output in 1usize..17,
    ) {
        let options = SignatureOptions { block_len, strong_len: 8, ..SignatureOptions::default() };
        let large = BufferSizes::default();
        let small = BufferSizes::new(input, output);

        let sig = signature_bytes(&basis, &options, large);
        prop_assert_eq!(&signature_bytes(&basis, &options, small), &sig);

        let (delta, _) = delta_bytes(&sig, &new, large);
        let (small_delta, _) = delta_bytes(&sig, &new, small);
        prop_assert_eq!(&small_delta, &delta);

        prop_assert_eq!(patched(&basis, &delta, small), new);
    }

    #[test]
    fn identical_files_need_no_literals(
        basis in prop::collection::vec(any::<u8>(), 1..2048),
        block_len in 1u32..128,
    ) {
        let options = SignatureOptions { block_len, ..SignatureOptions::default() };
        let sizes = BufferSizes::default();

        let sig = signature_bytes(&basis, &options, sizes);
        let (_, stats) = delta_bytes(&sig, &basis, sizes);
        prop_assert_eq!(stats.lit_bytes, 0);
        prop_assert_eq!(stats.matched_bytes(), basis.len() as u64);
    }

    #[test]
    fn truncated_signature_is_rejected(
        basis in prop::collection::vec(any::<u8>(), 1..512),
        block_len in 1u32..32,
        cut in any::<prop::sample::Index>(),
    ) {
        let options = SignatureOptions { block_len, strong_len: 8, ..SignatureOptions::default() };
        let sig = signature_bytes(&basis, &options, BufferSizes::default());

        // any cut that is not on a record boundary
        let len = cut.index(sig.len());
        prop_assume!(len < 12 || (len - 12) % 12 != 0);

        let failure = load_signature(&mut &sig[..len], BufferSizes::default()).unwrap_err();
        prop_assert_eq!(failure.kind(), rdelta::ErrorKind::Format);
    }
}

#[test]
fn one_byte_buffers_match_defaults_on_larger_input() {
    let basis: Vec<u8> = (0..40_000u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
    let mut new = basis.clone();
    new.splice(10_000..10_500, std::iter::repeat(0x42).take(900));
    new.truncate(35_000);

    let options = SignatureOptions {
        block_len: 700,
        ..SignatureOptions::default()
    };
    let tiny = BufferSizes::new(1, 1);

    let sig = signature_bytes(&basis, &options, BufferSizes::default());
    assert_eq!(signature_bytes(&basis, &options, tiny), sig);

    let (delta, _) = delta_bytes(&sig, &new, BufferSizes::default());
    let (tiny_delta, _) = delta_bytes(&sig, &new, tiny);
    assert_eq!(tiny_delta, delta);

    assert_eq!(patched(&basis, &delta, tiny), new);
}
