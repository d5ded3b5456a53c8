use std::io::{self, Read};

use log::{debug, warn};

use crate::armor::{self, BlockType};
use crate::composed::shared::decoder_stream;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    self, Packet, PacketParser, PacketTrait, PublicSubkey, SecretSubkey, Signature,
    SignatureType, UserId,
};
use crate::ser::Serialize;
use crate::types::{KeyFlags, KeyId, Tag};

/// Key packets a [`KeyRing`] can be made of.
pub trait RingKey: Clone + std::fmt::Debug {
    const PRIMARY_TAG: Tag;
    const SUBKEY_TAG: Tag;

    fn public_key(&self) -> &packet::PublicKey;

    /// Extracts a primary key from a parsed packet.
    fn from_primary(packet: Packet) -> std::result::Result<Self, Packet>;

    /// Extracts a subkey from a parsed packet.
    fn from_subkey(packet: Packet) -> std::result::Result<Self, Packet>;

    fn write_primary<W: io::Write>(&self, writer: &mut W) -> Result<()>;
    fn write_subkey<W: io::Write>(&self, writer: &mut W) -> Result<()>;
    /// Length of the key packet including its header.
    fn framed_len(&self) -> usize;

    fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }
}

impl RingKey for packet::PublicKey {
    const PRIMARY_TAG: Tag = Tag::PublicKey;
    const SUBKEY_TAG: Tag = Tag::PublicSubkey;

    fn public_key(&self) -> &packet::PublicKey {
        self
    }

    fn from_primary(packet: Packet) -> std::result::Result<Self, Packet> {
        match packet {
            Packet::PublicKey(key) => Ok(key),
            // a secret key export contains everything a public ring needs
            Packet::SecretKey(key) => Ok(key.public_key().clone()),
            other => Err(other),
        }
    }

    fn from_subkey(packet: Packet) -> std::result::Result<Self, Packet> {
        match packet {
            Packet::PublicSubkey(key) => Ok(key.into_inner()),
            Packet::SecretSubkey(key) => Ok(key.public_key().clone()),
            other => Err(other),
        }
    }

    fn write_primary<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, self)
    }

    fn write_subkey<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, &PublicSubkey::new(self.clone()))
    }

    fn framed_len(&self) -> usize {
        self.write_len_with_header()
    }
}

impl RingKey for packet::SecretKey {
    const PRIMARY_TAG: Tag = Tag::SecretKey;
    const SUBKEY_TAG: Tag = Tag::SecretSubkey;

    fn public_key(&self) -> &packet::PublicKey {
        packet::SecretKey::public_key(self)
    }

    fn from_primary(packet: Packet) -> std::result::Result<Self, Packet> {
        match packet {
            Packet::SecretKey(key) => Ok(key),
            other => Err(other),
        }
    }

    fn from_subkey(packet: Packet) -> std::result::Result<Self, Packet> {
        match packet {
            Packet::SecretSubkey(key) => Ok(key.into_inner()),
            other => Err(other),
        }
    }

    fn write_primary<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, self)
    }

    fn write_subkey<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, &SecretSubkey::new(self.clone()))
    }

    fn framed_len(&self) -> usize {
        self.write_len_with_header()
    }
}

/// A user id with the signatures over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub id: UserId,
    pub signatures: Vec<Signature>,
}

/// A subkey with its binding signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubkey<K> {
    pub key: K,
    pub signatures: Vec<Signature>,
}

/// A primary key with everything that belongs to it, in packet order.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-transferable-public-keys>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableKey<K> {
    pub primary: K,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub subkeys: Vec<SignedSubkey<K>>,
}

impl<K: RingKey> TransferableKey<K> {
    pub fn new(primary: K) -> Self {
        TransferableKey {
            primary,
            direct_signatures: Vec::new(),
            users: Vec::new(),
            subkeys: Vec::new(),
        }
    }

    /// Capabilities of the primary key, from its latest self-signature.
    pub fn primary_flags(&self) -> KeyFlags {
        let id = self.primary.key_id();
        let self_sigs = self
            .direct_signatures
            .iter()
            .chain(self.users.iter().flat_map(|user| user.signatures.iter()))
            .filter(|sig| {
                sig.typ()
                    .is_some_and(|typ| typ.is_certification() || typ == SignatureType::Key)
            })
            .filter(|sig| sig.issuer().map_or(true, |issuer| issuer == id));

        latest_flags(self_sigs)
            .unwrap_or_else(|| flags_for_algorithm(self.primary.public_key().algorithm()))
    }

    /// Capabilities of a subkey, from its latest binding signature.
    pub fn subkey_flags(&self, subkey: &SignedSubkey<K>) -> KeyFlags {
        let bindings = subkey
            .signatures
            .iter()
            .filter(|sig| sig.typ() == Some(SignatureType::SubkeyBinding));

        latest_flags(bindings)
            .unwrap_or_else(|| flags_for_algorithm(subkey.key.public_key().algorithm()))
    }
}

fn latest_flags<'a>(sigs: impl Iterator<Item = &'a Signature>) -> Option<KeyFlags> {
    sigs.filter_map(|sig| Some((sig.created(), sig.key_flags()?)))
        .max_by_key(|(created, _)| *created)
        .map(|(_, flags)| flags)
}

/// Capabilities assumed for keys without key flags.
fn flags_for_algorithm(alg: PublicKeyAlgorithm) -> KeyFlags {
    let mut flags = KeyFlags::default();
    flags.set_certify(alg.can_sign());
    flags.set_sign(alg.can_sign());
    flags.set_encrypt_comms(alg.can_encrypt());
    flags.set_encrypt_storage(alg.can_encrypt());
    flags
}

impl<K: RingKey> Serialize for TransferableKey<K> {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.primary.write_primary(writer)?;
        for sig in &self.direct_signatures {
            packet::write_packet(writer, sig)?;
        }
        for user in &self.users {
            packet::write_packet(writer, &user.id)?;
            for sig in &user.signatures {
                packet::write_packet(writer, sig)?;
            }
        }
        for subkey in &self.subkeys {
            subkey.key.write_subkey(writer)?;
            for sig in &subkey.signatures {
                packet::write_packet(writer, sig)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let sigs = |sigs: &[Signature]| -> usize {
            sigs.iter().map(|sig| sig.write_len_with_header()).sum()
        };

        self.primary.framed_len()
            + sigs(&self.direct_signatures)
            + self
                .users
                .iter()
                .map(|user| user.id.write_len_with_header() + sigs(&user.signatures))
                .sum::<usize>()
            + self
                .subkeys
                .iter()
                .map(|sub| sub.key.framed_len() + sigs(&sub.signatures))
                .sum::<usize>()
    }
}

/// One key of a ring, with what is known about it.
#[derive(Debug, Clone, Copy)]
pub struct KeyRingEntry<'a, K> {
    pub key: &'a K,
    pub flags: KeyFlags,
    pub is_primary: bool,
    /// User ids of the primary key this entry belongs to.
    pub users: &'a [SignedUser],
}

/// An ordered collection of keys, as found in a key ring file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing<K> {
    keys: Vec<TransferableKey<K>>,
}

/// Where signatures that follow are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    Primary,
    User,
    Subkey,
    Skip,
}

impl<K: RingKey> KeyRing<K> {
    pub fn new(keys: Vec<TransferableKey<K>>) -> Self {
        KeyRing { keys }
    }

    /// Reads a binary or ASCII armored key ring.
    ///
    /// Keys with unsupported versions are skipped along with everything
    /// belonging to them.
    pub fn from_reader<R: Read>(input: R) -> Result<Self> {
        let (stream, _headers) = decoder_stream(input)?;
        let mut parser = PacketParser::new(stream);

        let mut keys = Vec::new();
        let mut current: Option<TransferableKey<K>> = None;
        let mut attach = Attach::Skip;

        while let Some((tag, res)) = parser.next_tagged() {
            let packet = match res {
                Ok(packet) => packet,
                Err(Error::Unsupported { message }) => {
                    warn!("skipping unsupported {tag:?} packet: {message}");
                    if tag == Some(K::PRIMARY_TAG) {
                        // everything up to the next primary belongs to the skipped key
                        keys.extend(current.take());
                    }
                    if tag == Some(K::PRIMARY_TAG) || tag == Some(K::SUBKEY_TAG) {
                        attach = Attach::Skip;
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            let packet = match K::from_primary(packet) {
                Ok(primary) => {
                    debug!("key ring: primary key {}", primary.key_id());
                    keys.extend(current.replace(TransferableKey::new(primary)));
                    attach = Attach::Primary;
                    continue;
                }
                Err(packet) => packet,
            };

            if matches!(packet.tag(), Tag::PublicKey | Tag::SecretKey) {
                debug!("key ring: skipping {:?} of the wrong kind", packet.tag());
                keys.extend(current.take());
                continue;
            }

            let Some(current) = current.as_mut() else {
                debug!("key ring: ignoring {:?} outside of a usable key", packet.tag());
                continue;
            };

            let packet = match K::from_subkey(packet) {
                Ok(key) => {
                    debug!("key ring: subkey {}", key.key_id());
                    current.subkeys.push(SignedSubkey {
                        key,
                        signatures: Vec::new(),
                    });
                    attach = Attach::Subkey;
                    continue;
                }
                Err(packet) => packet,
            };

            match packet {
                Packet::UserId(id) => {
                    current.users.push(SignedUser {
                        id,
                        signatures: Vec::new(),
                    });
                    attach = Attach::User;
                }
                Packet::Signature(sig) => match attach {
                    Attach::Primary => current.direct_signatures.push(sig),
                    Attach::User => {
                        if let Some(user) = current.users.last_mut() {
                            user.signatures.push(sig);
                        }
                    }
                    Attach::Subkey => {
                        if let Some(sub) = current.subkeys.last_mut() {
                            sub.signatures.push(sig);
                        }
                    }
                    Attach::Skip => debug!("key ring: dropping signature"),
                },
                Packet::Marker(_) | Packet::Unknown { tag: Tag::Trust, .. } => {}
                other => {
                    // user attributes, subkeys of the wrong kind, and their signatures
                    debug!("key ring: skipping {:?}", other.tag());
                    attach = Attach::Skip;
                }
            }
        }

        keys.extend(current);
        debug!("key ring: {} keys", keys.len());
        Ok(KeyRing { keys })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    pub fn keys(&self) -> &[TransferableKey<K>] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<TransferableKey<K>> {
        self.keys
    }

    /// All primary keys and subkeys, in ring order.
    pub fn entries(&self) -> Vec<KeyRingEntry<'_, K>> {
        let mut out = Vec::new();
        for key in &self.keys {
            out.push(KeyRingEntry {
                key: &key.primary,
                flags: key.primary_flags(),
                is_primary: true,
                users: &key.users,
            });
            for sub in &key.subkeys {
                out.push(KeyRingEntry {
                    key: &sub.key,
                    flags: key.subkey_flags(sub),
                    is_primary: false,
                    users: &key.users,
                });
            }
        }
        out
    }

    pub fn to_armored_writer<W: io::Write>(
        &self,
        writer: &mut W,
        headers: Option<&armor::Headers>,
    ) -> Result<()> {
        let typ = if K::PRIMARY_TAG == Tag::SecretKey {
            BlockType::PrivateKey
        } else {
            BlockType::PublicKey
        };
        armor::write(self, typ, writer, headers, true)
    }

    pub fn to_armored_string(&self, headers: Option<&armor::Headers>) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;
        String::from_utf8(buf).map_err(|err| Error::Message {
            message: err.to_string(),
        })
    }
}

impl<K: RingKey> Serialize for KeyRing<K> {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for key in &self.keys {
            key.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.keys.iter().map(|key| key.write_len()).sum()
    }
}
