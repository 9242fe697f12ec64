//! Webhook 签名（HMAC-SHA256）

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// 签名 header 前缀
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// 计算 `sha256=<hex>` 形式的签名
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// 常量时间比较签名
pub fn verify(secret: &str, body: &[u8], provided: &str) -> bool {
    let expected = sign(secret, body);
    let provided = provided.trim();
    if provided.len() != expected.len() {
        return false;
    }
    expected
        .as_bytes()
        .ct_eq(provided.to_ascii_lowercase().as_bytes())
        .into()
}
