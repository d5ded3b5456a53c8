use std::io::{Cursor, Read};
use std::sync::OnceLock;

use pgp_envelope::composed::{
    decrypt, encrypt, EncryptionConfig, KeyType, PrivateKey, PublicKeyRing, SecretKeyParamsBuilder,
    SecretKeyRing, MAX_NESTING,
};
use pgp_envelope::crypto::sym::SymmetricKeyAlgorithm;
use pgp_envelope::errors::Error;
use pgp_envelope::packet::{
    write_packet, CompressedData, LiteralData, Marker, PacketHeader, PublicKey,
    PublicKeyEncryptedSessionKey, SymEncryptedProtectedData, UserId,
};
use pgp_envelope::types::{CompressionAlgorithm, PacketLength, Password, Tag};
use pretty_assertions::assert_eq;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const PASSPHRASE: &str = "correct horse";

fn gen_ring(seed: u64) -> SecretKeyRing {
    SecretKeyParamsBuilder::default()
        .key_type(KeyType::Rsa(1024))
        .primary_user_id("Test <test@example.com>")
        .passphrase(PASSPHRASE)
        .s2k_count(0)
        .build()
        .unwrap()
        .generate(ChaCha8Rng::seed_from_u64(seed))
        .unwrap()
}

fn alice() -> &'static (SecretKeyRing, PublicKeyRing) {
    static KEYS: OnceLock<(SecretKeyRing, PublicKeyRing)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let secret = gen_ring(1);
        let public = secret.to_public();
        (secret, public)
    })
}

fn alice_private() -> PrivateKey {
    alice()
        .0
        .decryption_key(&Password::from(PASSPHRASE))
        .unwrap()
}

fn alice_public() -> &'static PublicKey {
    alice().1.encryption_key().unwrap()
}

fn config(armor: bool, integrity: bool, compression: Option<CompressionAlgorithm>) -> EncryptionConfig {
    let mut builder = EncryptionConfig::builder();
    builder
        .armor(armor)
        .integrity_protected(integrity)
        .file_name("message.txt");
    match compression {
        Some(alg) => builder.compression(alg),
        None => builder.no_compression(),
    };
    builder.build().unwrap()
}

fn encrypt_to_vec(rng: &mut ChaCha8Rng, data: &[u8], config: &EncryptionConfig) -> Vec<u8> {
    let mut out = Vec::new();
    encrypt(rng, data, alice_public(), config, &mut out).unwrap();
    out
}

/// Wraps `inner` into a PKESK + SEIPD message for alice.
fn seal(rng: &mut ChaCha8Rng, recipient: &PublicKey, inner: &[u8]) -> Vec<u8> {
    let alg = SymmetricKeyAlgorithm::AES128;
    let session_key = alg.new_session_key(&mut *rng);
    let esk =
        PublicKeyEncryptedSessionKey::from_session_key(&mut *rng, &session_key, alg, recipient)
            .unwrap();
    let edata = SymEncryptedProtectedData::encrypt(&mut *rng, alg, &session_key, inner).unwrap();

    let mut out = Vec::new();
    write_packet(&mut out, &esk).unwrap();
    write_packet(&mut out, &edata).unwrap();
    out
}

fn literal(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_packet(&mut out, &LiteralData::from_bytes("inner.txt", data.to_vec())).unwrap();
    out
}

#[test]
fn roundtrip_all_shapes() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let key = alice_private();

    let mut data = vec![0u8; 3000];
    rng.fill_bytes(&mut data);
    data.extend_from_slice(&b"some text ".repeat(200));

    for armor in [false, true] {
        for integrity in [true, false] {
            for compression in [None, Some(CompressionAlgorithm::ZIP)] {
                let config = config(armor, integrity, compression);
                let encrypted = encrypt_to_vec(&mut rng, &data, &config);
                assert_eq!(
                    encrypted.starts_with(b"-----BEGIN PGP MESSAGE-----"),
                    armor,
                    "{config:?}"
                );

                let mut plaintext = Vec::new();
                let header = decrypt(&encrypted[..], &key, &mut plaintext).unwrap();
                assert_eq!(header.file_name(), b"message.txt");
                assert!(plaintext == data, "{config:?}");
            }
        }
    }
}

#[test]
fn other_compression_algorithms() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let key = alice_private();

    for alg in [
        CompressionAlgorithm::Uncompressed,
        CompressionAlgorithm::ZLIB,
        CompressionAlgorithm::BZip2,
    ] {
        let encrypted = encrypt_to_vec(&mut rng, b"hello hello hello", &config(false, true, Some(alg)));
        let mut plaintext = Vec::new();
        decrypt(&encrypted[..], &key, &mut plaintext).unwrap();
        assert_eq!(plaintext, b"hello hello hello");
    }
}

#[test]
fn empty_input() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let encrypted = encrypt_to_vec(&mut rng, b"", &config(true, true, None));

    let mut plaintext = Vec::new();
    let header = decrypt(&encrypted[..], &alice_private(), &mut plaintext).unwrap();
    assert!(plaintext.is_empty());
    assert_eq!(header.file_name(), b"message.txt");
}

#[test]
fn large_messages_use_partial_lengths() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut data = vec![0u8; 100 * 1024];
    rng.fill_bytes(&mut data);

    let config = EncryptionConfig::builder()
        .no_compression()
        .chunk_size(512)
        .build()
        .unwrap();
    let encrypted = encrypt_to_vec(&mut rng, &data, &config);

    let mut cursor = Cursor::new(&encrypted[..]);
    let esk = PacketHeader::try_from_reader(&mut cursor).unwrap().unwrap();
    assert_eq!(esk.tag(), Tag::PublicKeyEncryptedSessionKey);
    let PacketLength::Fixed(len) = esk.packet_length() else {
        panic!("unexpected length {:?}", esk.packet_length());
    };
    std::io::copy(&mut (&mut cursor).take(u64::from(len)), &mut std::io::sink()).unwrap();

    let edata = PacketHeader::try_from_reader(&mut cursor).unwrap().unwrap();
    assert_eq!(edata.tag(), Tag::SymEncryptedProtectedData);
    assert_eq!(edata.packet_length(), PacketLength::Partial(512));

    let mut plaintext = Vec::new();
    decrypt(&encrypted[..], &alice_private(), &mut plaintext).unwrap();
    assert!(plaintext == data);
}

#[test]
fn tampered_message_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let encrypted = encrypt_to_vec(&mut rng, &b"attack at dawn".repeat(50), &config(false, true, None));
    let key = alice_private();

    for offset in [1, 10, 30] {
        let mut tampered = encrypted.clone();
        let pos = tampered.len() - offset;
        tampered[pos] ^= 0x01;

        let mut plaintext = Vec::new();
        let err = decrypt(&tampered[..], &key, &mut plaintext).unwrap_err();
        assert!(matches!(err, Error::IntegrityCheckFailed), "{err:?}");
        assert!(plaintext.is_empty());
    }
}

#[test]
fn every_ciphertext_byte_is_covered_by_the_mdc() {
    let mut rng = ChaCha8Rng::seed_from_u64(16);
    let encrypted = encrypt_to_vec(&mut rng, b"attack at dawn", &EncryptionConfig::default());
    let key = alice_private();

    let mut cursor = Cursor::new(&encrypted[..]);
    let esk = PacketHeader::try_from_reader(&mut cursor).unwrap().unwrap();
    assert_eq!(esk.tag(), Tag::PublicKeyEncryptedSessionKey);
    let PacketLength::Fixed(esk_len) = esk.packet_length() else {
        panic!("unexpected length {:?}", esk.packet_length());
    };
    cursor.set_position(cursor.position() + u64::from(esk_len));
    let edata = PacketHeader::try_from_reader(&mut cursor).unwrap().unwrap();
    assert_eq!(edata.tag(), Tag::SymEncryptedProtectedData);
    assert_eq!(
        edata.packet_length(),
        PacketLength::Fixed((encrypted.len() as u64 - cursor.position()) as u32)
    );

    // everything after the version octet is ciphertext
    let ciphertext = cursor.position() as usize + 1;
    for pos in ciphertext..encrypted.len() {
        let mut tampered = encrypted.clone();
        tampered[pos] ^= 0x80;

        let mut plaintext = Vec::new();
        let err = decrypt(&tampered[..], &key, &mut plaintext).unwrap_err();
        assert!(matches!(err, Error::IntegrityCheckFailed), "byte {pos}: {err:?}");
        assert!(plaintext.is_empty(), "byte {pos}");
    }
}

#[test]
fn foreign_key_is_a_mismatch() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let encrypted = encrypt_to_vec(&mut rng, b"for alice only", &config(false, true, None));

    let bob = gen_ring(8)
        .decryption_key(&Password::from(PASSPHRASE))
        .unwrap();
    let err = decrypt(&encrypted[..], &bob, &mut Vec::new()).unwrap_err();
    match err {
        Error::KeyMismatch { key_id } => assert_eq!(key_id, bob.key_id()),
        err => panic!("unexpected error {err:?}"),
    }
}

#[test]
fn wrong_passphrase() {
    let err = alice()
        .0
        .decryption_key(&Password::from("incorrect horse"))
        .unwrap_err();
    assert!(matches!(err, Error::WrongPassphrase { .. }), "{err:?}");
}

#[test]
fn no_encrypted_data() {
    let mut raw = Vec::new();
    write_packet(&mut raw, &Marker).unwrap();
    raw.extend_from_slice(&literal(b"plain"));

    let err = decrypt(&raw[..], &alice_private(), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, Error::NoEncryptedData), "{err:?}");

    let err = decrypt(&b""[..], &alice_private(), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, Error::NoEncryptedData), "{err:?}");
}

#[test]
fn leading_packets_are_skipped() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut raw = Vec::new();
    write_packet(&mut raw, &Marker).unwrap();
    write_packet(&mut raw, &UserId::from_str("noise")).unwrap();
    raw.extend_from_slice(&seal(&mut rng, alice_public(), &literal(b"payload")));

    let mut plaintext = Vec::new();
    let header = decrypt(&raw[..], &alice_private(), &mut plaintext).unwrap();
    assert_eq!(plaintext, b"payload");
    assert_eq!(header.file_name(), b"inner.txt");
}

#[test]
fn signed_content_is_unsupported() {
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    // one pass signature packet in front of the literal data
    let mut inner = vec![0xC4, 1, 3];
    inner.extend_from_slice(&literal(b"signed"));

    let raw = seal(&mut rng, alice_public(), &inner);
    let mut plaintext = Vec::new();
    let err = decrypt(&raw[..], &alice_private(), &mut plaintext).unwrap_err();
    assert!(matches!(err, Error::UnsupportedSignedMessage), "{err:?}");
    assert!(plaintext.is_empty());
}

#[test]
fn unexpected_inner_content() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut inner = Vec::new();
    write_packet(&mut inner, &UserId::from_str("not a message")).unwrap();

    let raw = seal(&mut rng, alice_public(), &inner);
    let err = decrypt(&raw[..], &alice_private(), &mut Vec::new()).unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedMessageType { tag: Tag::UserId }),
        "{err:?}"
    );
}

#[test]
fn unknown_inner_compression() {
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let raw = seal(&mut rng, alice_public(), &[0xC8, 3, 42, 1, 2]);

    let err = decrypt(&raw[..], &alice_private(), &mut Vec::new()).unwrap_err();
    assert!(
        matches!(err, Error::UnsupportedCompression { algorithm: 42 }),
        "{err:?}"
    );
}

fn nested(layers: usize) -> Vec<u8> {
    let mut inner = literal(b"deep");
    for _ in 0..layers {
        let packet = CompressedData::from_raw(CompressionAlgorithm::ZIP, &inner).unwrap();
        inner.clear();
        write_packet(&mut inner, &packet).unwrap();
    }
    inner
}

#[test]
fn nesting_is_capped() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let key = alice_private();

    let raw = seal(&mut rng, alice_public(), &nested(MAX_NESTING));
    let mut plaintext = Vec::new();
    decrypt(&raw[..], &key, &mut plaintext).unwrap();
    assert_eq!(plaintext, b"deep");

    let raw = seal(&mut rng, alice_public(), &nested(MAX_NESTING + 1));
    let err = decrypt(&raw[..], &key, &mut Vec::new()).unwrap_err();
    assert!(
        matches!(err, Error::NestingTooDeep { max: 16 }),
        "{err:?}"
    );
}

#[test]
fn elgamal_subkey_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(14);
    let secret = SecretKeyParamsBuilder::default()
        .key_type(KeyType::Rsa(1024))
        .can_encrypt(false)
        .subkey(KeyType::Elgamal)
        .primary_user_id("Elgamal <elg@example.com>")
        .build()
        .unwrap()
        .generate(&mut rng)
        .unwrap();
    let public = secret.to_public();

    let recipient = public.encryption_key().unwrap();
    assert_eq!(
        recipient.algorithm(),
        pgp_envelope::crypto::public_key::PublicKeyAlgorithm::Elgamal
    );

    let mut encrypted = Vec::new();
    encrypt(
        &mut rng,
        &b"elgamal payload"[..],
        recipient,
        &config(true, true, Some(CompressionAlgorithm::ZIP)),
        &mut encrypted,
    )
    .unwrap();

    let key = secret.decryption_key(&Password::empty()).unwrap();
    assert_eq!(key.key_id(), recipient.key_id());
    let mut plaintext = Vec::new();
    decrypt(&encrypted[..], &key, &mut plaintext).unwrap();
    assert_eq!(plaintext, b"elgamal payload");
}

#[test]
fn armor_checksum_is_verified() {
    let mut rng = ChaCha8Rng::seed_from_u64(15);
    let encrypted = encrypt_to_vec(&mut rng, b"checked", &config(true, true, None));
    let text = String::from_utf8(encrypted).unwrap();

    let crc_line = text
        .lines()
        .find(|line| line.starts_with('=') && line.len() == 5)
        .unwrap()
        .to_string();
    let replacement = if crc_line == "=AAAA" { "=BBBB" } else { "=AAAA" };
    let broken = text.replace(&crc_line, replacement);

    let err = decrypt(broken.as_bytes(), &alice_private(), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, Error::ArmorChecksumMismatch { .. }), "{err:?}");
}
