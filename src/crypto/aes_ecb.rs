//! AES-128-ECB 解密与宽松的 PKCS7 去填充

use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit};

use crate::error::{NcmError, NcmResult};

/// AES 分组长度（字节）
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128-ECB 解密（无IV，逐块独立解密）
///
/// 输入长度必须是16的倍数，否则返回 `CorruptKeyData`。
/// 不做去填充，去填充由调用方通过 [`pkcs7_unpad`] 完成。
pub fn aes_ecb_decrypt(data: &[u8], key: &[u8; 16]) -> NcmResult<Vec<u8>> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(NcmError::CorruptKeyData(format!(
            "密文长度({})不是{AES_BLOCK_SIZE}的倍数",
            data.len()
        )));
    }

    let cipher = Aes128::new(key.into());
    let mut result = data.to_vec();

    for chunk in result.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.decrypt_block(aes::Block::from_mut_slice(chunk));
    }

    Ok(result)
}

/// 宽松的 PKCS7 去填充
///
/// 末字节 `p` 满足 `1 <= p <= 16` 且 `p <= len` 时截掉末尾 `p` 字节，
/// 否则原样返回。不校验填充字节内容，也从不报错。
pub fn pkcs7_unpad(data: &[u8]) -> &[u8] {
    match data.last() {
        Some(&padding) => {
            let padding = padding as usize;
            if (1..=AES_BLOCK_SIZE).contains(&padding) && padding <= data.len() {
                &data[..data.len() - padding]
            } else {
                data
            }
        }
        None => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncrypt;

    const KEY: [u8; 16] = *b"0123456789abcdef";

    fn pad(data: &[u8], padding: u8) -> Vec<u8> {
        let mut out = data.to_vec();
        out.extend(std::iter::repeat_n(padding, padding as usize));
        out
    }

    fn encrypt(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
        let cipher = Aes128::new(key.into());
        let mut out = data.to_vec();
        for chunk in out.chunks_exact_mut(AES_BLOCK_SIZE) {
            cipher.encrypt_block(aes::Block::from_mut_slice(chunk));
        }
        out
    }

    #[test]
    fn test_decrypt_blocks_independently() {
        // 两个相同的明文块在 ECB 下密文相同
        let plain = [0x42u8; 32];
        let cipher_text = encrypt(&plain, &KEY);
        assert_eq!(cipher_text[..16], cipher_text[16..]);

        let decrypted = aes_ecb_decrypt(&cipher_text, &KEY).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_decrypt_known_vector() {
        // FIPS-197 附录 C.1
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let cipher_text = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];
        let plain = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        assert_eq!(aes_ecb_decrypt(&cipher_text, &key).unwrap(), plain);
    }

    #[test]
    fn test_misaligned_input_is_corrupt_key() {
        let result = aes_ecb_decrypt(&[0u8; 17], &KEY);
        assert!(matches!(result, Err(NcmError::CorruptKeyData(_))));
    }

    #[test]
    fn test_empty_input_decrypts_to_empty() {
        assert!(aes_ecb_decrypt(&[], &KEY).unwrap().is_empty());
    }

    #[test]
    fn test_unpad_all_valid_lengths() {
        let payload = b"music:{\"format\":\"flac\"}";
        for padding in 1..=16u8 {
            let padded = pad(payload, padding);
            assert_eq!(pkcs7_unpad(&padded), payload, "padding = {padding}");
        }
    }

    #[test]
    fn test_unpad_is_identity_on_invalid_padding() {
        let zero = [1u8, 2, 3, 0];
        assert_eq!(pkcs7_unpad(&zero), &zero);

        let too_large = [1u8, 2, 3, 17];
        assert_eq!(pkcs7_unpad(&too_large), &too_large);

        // 填充长度超过缓冲区长度
        let short = [9u8, 9, 9];
        assert_eq!(pkcs7_unpad(&short), &short);

        assert!(pkcs7_unpad(&[]).is_empty());
    }
}
