//! 内容哈希
//!
//! qid、翻译缓存键、问卷顺序签名都基于 SHA-256 十六进制摘要

use sha2::{Digest, Sha256};

/// 计算文本的 SHA-256 十六进制摘要
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// 取摘要前 `len` 个字符作为短 id
pub fn short_hash(text: &str, len: usize) -> String {
    let mut digest = content_hash(text);
    digest.truncate(len);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_short_hash_length() {
        assert_eq!(short_hash("methodA|methodB|0|hello", 16).len(), 16);
    }
}
