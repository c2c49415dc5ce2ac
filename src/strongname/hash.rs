use std::ops::Range;

use goblin::pe::PE;
use log::debug;
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};

use crate::{
    file::{File, DIRECTORY_SECURITY, SECTION_HEADER_SIZE},
    metadata::cor20header::Cor20Header,
    strongname::{parse_public_key, StrongNameKey},
    writer::checksum::CHECKSUM_FIELD,
    Error::{self, GoblinErr, OutOfBounds},
    Result,
};

/// SHA-1 hash a strong name signature covers.
///
/// The hash runs over the headers up to the end of the section table, with the PE
/// checksum and the security directory entry zeroed, followed by the raw data of every
/// section in table order. Padding between the section table and `SizeOfHeaders` is not
/// covered, and neither are the bytes in `signature` (the signature blob itself).
///
/// # Errors
/// Fails if `data` is not a PE image or a section lies outside of it.
pub fn image_digest(data: &[u8], signature: Range<usize>) -> Result<[u8; 20]> {
    let pe = PE::parse(data).map_err(GoblinErr)?;
    if pe.header.optional_header.is_none() {
        return Err(malformed_error!("File does not have an OptionalHeader"));
    }

    let optional = pe.header.dos_header.pe_pointer as usize + 24;
    let checksum = optional + CHECKSUM_FIELD;
    let security = optional + if pe.is_64 { 112 } else { 96 } + DIRECTORY_SECURITY * 8;

    let coff = &pe.header.coff_header;
    let headers = optional
        + coff.size_of_optional_header as usize
        + coff.number_of_sections as usize * SECTION_HEADER_SIZE;
    let mut header_bytes = data.get(..headers).ok_or(OutOfBounds)?.to_vec();
    header_bytes
        .get_mut(checksum..checksum + 4)
        .ok_or(OutOfBounds)?
        .fill(0);
    header_bytes
        .get_mut(security..security + 8)
        .ok_or(OutOfBounds)?
        .fill(0);

    let mut hasher = Sha1::new();
    hasher.update(&header_bytes);

    for section in &pe.sections {
        let start = section.pointer_to_raw_data as usize;
        let end = start + section.size_of_raw_data as usize;
        let raw = data.get(start..end).ok_or(OutOfBounds)?;

        if signature.start >= start && signature.end <= end {
            hasher.update(&raw[..signature.start - start]);
            hasher.update(&raw[signature.end - start..]);
        } else {
            hasher.update(raw);
        }
    }

    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

/// Sign the image in `data`, writing the signature over the blob at `signature`.
///
/// # Errors
/// Fails if the blob does not have the key's signature size or the image cannot be hashed.
pub fn sign_image(data: &mut [u8], signature: Range<usize>, key: &StrongNameKey) -> Result<()> {
    if signature.len() != key.signature_size() {
        return Err(Error::InvalidKey(format!(
            "The signature blob holds {} bytes, the key signs {}",
            signature.len(),
            key.signature_size()
        )));
    }

    let digest = image_digest(data, signature.clone())?;
    let signed = key.sign(&digest)?;
    data.get_mut(signature)
        .ok_or(OutOfBounds)?
        .copy_from_slice(&signed);

    debug!("Strong name signature written ({} bytes)", signed.len());
    Ok(())
}

/// Check the strong name signature of `file` against `public_key` (an
/// `Assembly.PublicKey` blob).
///
/// Returns `false` for an unsigned image or a signature that does not match.
///
/// # Errors
/// Fails if the CLI header or the public key blob is malformed.
pub fn verify_image(file: &File, public_key: &[u8]) -> Result<bool> {
    let (clr_rva, clr_size) = file.clr();
    let cor20 = Cor20Header::read(file.rva_slice(clr_rva, clr_size as usize)?)?;
    if cor20.strong_name_signature_rva == 0 || cor20.strong_name_signature_size == 0 {
        return Ok(false);
    }

    let start = file.rva_to_offset(cor20.strong_name_signature_rva as usize)?;
    let range = start..start + cor20.strong_name_signature_size as usize;
    let mut stored = file.data_slice(start, range.len())?.to_vec();
    stored.reverse();

    let digest = image_digest(file.data(), range)?;
    let key = parse_public_key(public_key)?;

    Ok(key
        .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &stored)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::io::write_le,
        strongname::tests::{generated_key, private_key_blob},
        test::fixture::ImageFixture,
    };

    fn signed_fixture(key: &StrongNameKey) -> (Vec<u8>, Range<usize>) {
        let data = ImageFixture::new()
            .with_strong_name_signature(key.signature_size() as u32)
            .build();
        let file = File::from_mem(data.clone()).unwrap();
        let (clr_rva, _) = file.clr();
        let cor20 = Cor20Header::read(file.rva_slice(clr_rva, 72).unwrap()).unwrap();
        let start = file
            .rva_to_offset(cor20.strong_name_signature_rva as usize)
            .unwrap();
        (data, start..start + key.signature_size())
    }

    #[test]
    fn digest_ignores_excluded_bytes() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let (mut data, range) = signed_fixture(&key);
        let file = File::from_mem(data.clone()).unwrap();
        let before = image_digest(&data, range.clone()).unwrap();

        // Checksum and signature blob are not covered
        write_le(&mut data[file.checksum_offset()..], 0xDEAD_BEEFu32).unwrap();
        data[range.start] ^= 0xFF;
        assert_eq!(image_digest(&data, range.clone()).unwrap(), before);

        // Section data is
        let text = file.sections()[0].pointer_to_raw_data as usize;
        data[text + 1] ^= 0xFF;
        assert_ne!(image_digest(&data, range).unwrap(), before);
    }

    /// Digest assembled from the `File` offsets: headers through the section table, then
    /// each section with the signature blob cut out.
    fn headers_then_sections(data: &[u8], signature: Range<usize>) -> [u8; 20] {
        let file = File::from_mem(data.to_vec()).unwrap();
        let table_end = file.section_table_offset() + file.sections().len() * SECTION_HEADER_SIZE;

        let mut headers = data[..table_end].to_vec();
        let checksum = file.checksum_offset();
        headers[checksum..checksum + 4].fill(0);
        let security = file.data_directory_offset(DIRECTORY_SECURITY).unwrap();
        headers[security..security + 8].fill(0);

        let mut covered = headers;
        for section in file.sections() {
            let start = section.pointer_to_raw_data as usize;
            let end = start + section.size_of_raw_data as usize;
            for offset in start..end {
                if !signature.contains(&offset) {
                    covered.push(data[offset]);
                }
            }
        }

        let mut digest = [0u8; 20];
        digest.copy_from_slice(&Sha1::digest(&covered));
        digest
    }

    #[test]
    fn header_padding_is_not_covered() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let (mut data, range) = signed_fixture(&key);
        let file = File::from_mem(data.clone()).unwrap();
        let table_end = file.section_table_offset() + file.sections().len() * SECTION_HEADER_SIZE;
        let first_section = file.sections()[0].pointer_to_raw_data as usize;
        assert!(table_end < first_section);

        let before = image_digest(&data, range.clone()).unwrap();
        data[table_end] ^= 0xFF;
        data[first_section - 1] ^= 0xFF;
        assert_eq!(image_digest(&data, range.clone()).unwrap(), before);

        // The last section header is
        data[table_end - 1] ^= 0xFF;
        assert_ne!(image_digest(&data, range).unwrap(), before);
    }

    #[test]
    fn signature_matches_section_table_digest() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let (mut data, range) = signed_fixture(&key);
        sign_image(&mut data, range.clone(), &key).unwrap();

        let digest = headers_then_sections(&data, range.clone());
        assert_eq!(image_digest(&data, range.clone()).unwrap(), digest);

        let mut stored = data[range].to_vec();
        stored.reverse();
        parse_public_key(key.public_key())
            .unwrap()
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &stored)
            .unwrap();
    }

    #[test]
    fn sign_and_verify() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let (mut data, range) = signed_fixture(&key);

        sign_image(&mut data, range.clone(), &key).unwrap();
        let file = File::from_mem(data.clone()).unwrap();
        assert!(verify_image(&file, key.public_key()).unwrap());

        let other = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        assert!(!verify_image(&file, other.public_key()).unwrap());

        data[range.start + 3] ^= 0x01;
        let file = File::from_mem(data).unwrap();
        assert!(!verify_image(&file, key.public_key()).unwrap());
    }

    #[test]
    fn unsigned_image() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let file = File::from_mem(ImageFixture::new().build()).unwrap();
        assert!(!verify_image(&file, key.public_key()).unwrap());
    }

    #[test]
    fn blob_size_mismatch() {
        let key = StrongNameKey::from_bytes(&private_key_blob(&generated_key())).unwrap();
        let (mut data, range) = signed_fixture(&key);
        assert!(matches!(
            sign_image(&mut data, range.start..range.end - 1, &key),
            Err(Error::InvalidKey(_))
        ));
    }
}
