//! 密码学原语
//!
//! NCM 解密链路的两层基础：固定密钥的 AES-128-ECB 块解密，
//! 以及按文件派生的 256 字节置换表（KeyBox）和位置相关密钥流。

mod aes_ecb;
mod key_box;

pub use aes_ecb::{AES_BLOCK_SIZE, aes_ecb_decrypt, pkcs7_unpad};
pub use key_box::{KeyBox, build_key_box, keystream_byte};
