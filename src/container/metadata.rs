//! 元数据块解析
//!
//! 只解析到能拿到输出扩展名（`format` 字段）为止。任何失败都以
//! `MetadataError` 返回，由解析器降级为默认格式，不会导致整个文件失败。

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use super::{META_JSON_PREFIX, META_MASK, META_PREFIX, NcmKeySet};
use crate::crypto::{aes_ecb_decrypt, pkcs7_unpad};
use crate::error::{NcmResult, metadata_error};

/// 默认输出格式
pub const DEFAULT_FORMAT: &str = "mp3";

#[derive(Debug, Deserialize)]
struct MusicMetadata {
    #[serde(default)]
    format: Option<String>,
}

/// 从元数据块中提取输出格式
///
/// 流程：逐字节异或 → 去掉22字节前缀 → Base64解码 → AES-ECB(meta_key)
/// → 去填充 → 去掉6字节前缀 → JSON。
pub fn decode_format(block: &[u8], keys: &NcmKeySet) -> NcmResult<String> {
    let masked: Vec<u8> = block.iter().map(|b| b ^ META_MASK).collect();

    let encoded = masked
        .get(META_PREFIX.len()..)
        .ok_or_else(|| metadata_error("元数据块过短", masked.len()))?;
    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| metadata_error("Base64解码失败", e))?;

    let decrypted = aes_ecb_decrypt(&encrypted, &keys.meta_key)
        .map_err(|e| metadata_error("AES解密失败", e))?;
    let plain = pkcs7_unpad(&decrypted);

    let json = plain
        .get(META_JSON_PREFIX.len()..)
        .ok_or_else(|| metadata_error("解密后的元数据过短", plain.len()))?;
    let meta: MusicMetadata =
        serde_json::from_slice(json).map_err(|e| metadata_error("JSON解析失败", e))?;

    Ok(normalize_format(meta.format.as_deref()))
}

/// 规范化扩展名：小写、去掉前导点，空值回退到默认格式
pub fn normalize_format(format: Option<&str>) -> String {
    match format.map(|f| f.trim().trim_start_matches('.')) {
        Some(f) if !f.is_empty() => f.to_ascii_lowercase(),
        _ => DEFAULT_FORMAT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NcmError;

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format(Some("flac")), "flac");
        assert_eq!(normalize_format(Some("FLAC")), "flac");
        assert_eq!(normalize_format(Some(".mp3")), "mp3");
        assert_eq!(normalize_format(Some("")), DEFAULT_FORMAT);
        assert_eq!(normalize_format(None), DEFAULT_FORMAT);
    }

    #[test]
    fn test_short_block_is_metadata_error() {
        let result = decode_format(&[0u8; 10], &NcmKeySet::default());
        assert!(matches!(result, Err(NcmError::MetadataError(_))));
    }

    #[test]
    fn test_garbage_base64_is_metadata_error() {
        // 异或后为非法 Base64 字符
        let mut block: Vec<u8> = META_PREFIX.iter().map(|b| b ^ META_MASK).collect();
        block.extend(b"!!!!".iter().map(|b| b ^ META_MASK));
        let result = decode_format(&block, &NcmKeySet::default());
        assert!(matches!(result, Err(NcmError::MetadataError(_))));
    }
}
