pub mod ip;
pub mod password;
pub mod signature;
pub mod validation;

use base64::Engine;

/// 生成 URL-safe 的随机 token（`bytes` 字节熵，Base64 无填充编码）
pub fn generate_secure_token(bytes: usize) -> String {
    let raw: Vec<u8> = std::iter::repeat_with(rand::random::<u8>)
        .take(bytes)
        .collect();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

/// 生成小写字母数字随机串（用于 slug 后缀）
pub fn generate_random_suffix(length: usize) -> String {
    let chars = b"abcdefghijklmnopqrstuvwxyz0123456789";
    std::iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}

/// 新实体 ID
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_token_length_and_charset() {
        let token = generate_secure_token(32);
        // 32 bytes -> 43 chars without padding
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_secure_token(32));
    }

    #[test]
    fn test_random_suffix() {
        let suffix = generate_random_suffix(6);
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }
}
