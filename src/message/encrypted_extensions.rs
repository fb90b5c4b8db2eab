use nom::IResult;

use super::extension::{parse_extensions, serialize_extensions, ExtensionVec};

/// The 1.3 server's non-hello negotiation results.
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptedExtensions<'a> {
    pub extensions: ExtensionVec<'a>,
}

impl<'a> EncryptedExtensions<'a> {
    pub fn new() -> Self {
        EncryptedExtensions {
            extensions: ExtensionVec::new(),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], EncryptedExtensions<'a>> {
        let (input, extensions) = parse_extensions(input)?;
        Ok((input, EncryptedExtensions { extensions }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        // the block length is always present, even when empty
        serialize_extensions(&self.extensions, output);
    }
}

impl Default for EncryptedExtensions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::super::{Extension, ExtensionType};
    use super::*;

    #[test]
    fn roundtrip() {
        const MESSAGE: &[u8] = &[
            0x00, 0x08, // extensions block length
            0x00, 0x0A, // supported_groups
            0x00, 0x04, //
            0x00, 0x02, 0x00, 0x1D, //
        ];

        let mut encrypted_extensions = EncryptedExtensions::new();
        encrypted_extensions
            .extensions
            .push(Extension::new(ExtensionType::SupportedGroups, &MESSAGE[6..10]));

        let mut serialized = Vec::new();
        encrypted_extensions.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = EncryptedExtensions::parse(&serialized).unwrap();
        assert_eq!(parsed, encrypted_extensions);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_block() {
        const MESSAGE: &[u8] = &[0x00, 0x00];

        let (rest, parsed) = EncryptedExtensions::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.extensions.is_empty());

        let mut serialized = Vec::new();
        parsed.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);
    }
}
