use bitfield::bitfield;

bitfield! {
    /// The first octet of the key flags subpacket.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-key-flags>
    #[derive(Default, PartialEq, Eq, Copy, Clone)]
    pub struct KeyFlags(u8);
    impl Debug;

    pub certify, set_certify: 0;
    pub sign, set_sign: 1;
    pub encrypt_comms, set_encrypt_comms: 2;
    pub encrypt_storage, set_encrypt_storage: 3;
    pub shared, set_shared: 4;
    pub authentication, set_authentication: 5;
    pub group, set_group: 7;
}

impl KeyFlags {
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Either of the two encryption usages.
    pub fn can_encrypt(self) -> bool {
        self.encrypt_comms() || self.encrypt_storage()
    }
}

/// Only the first octet of a subpacket body carries flags we look at.
impl<'a> From<&'a [u8]> for KeyFlags {
    fn from(other: &'a [u8]) -> Self {
        match other.first() {
            Some(bits) => KeyFlags(*bits),
            None => Default::default(),
        }
    }
}
