//! 输入校验帮助函数

use url::Url;

use crate::errors::{Result, SeoHubError};

/// 危险协议列表
const DANGEROUS_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "blob"];

/// 校验绝对 http(s) URL
pub fn validate_http_url(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SeoHubError::validation(format!("{} cannot be empty", field)));
    }

    let parsed = Url::parse(value)
        .map_err(|e| SeoHubError::validation(format!("{} is not a valid URL: {}", field, e)))?;

    let scheme = parsed.scheme();
    if DANGEROUS_SCHEMES.contains(&scheme) || (scheme != "http" && scheme != "https") {
        return Err(SeoHubError::validation(format!(
            "{} must start with http:// or https://",
            field
        )));
    }
    if parsed.host_str().is_none_or(|h| h.is_empty()) {
        return Err(SeoHubError::validation(format!("{} must have a host", field)));
    }

    Ok(value.to_string())
}

/// 规范化并粗略校验邮箱地址
pub fn normalize_email(value: &str) -> Result<String> {
    let email = value.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 254 {
        return Err(SeoHubError::validation(format!(
            "Invalid email address: {}",
            value.trim()
        )));
    }
    Ok(email)
}

/// 校验字符数范围并返回 trim 后的值
pub fn require_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 {
        return Err(SeoHubError::validation(format!("{} is required", field)));
    }
    if len > max_chars {
        return Err(SeoHubError::validation(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

/// 从名称派生 slug：小写，非字母数字折叠为单个 `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(100);
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "agency".to_string()
    } else {
        slug
    }
}

/// 按字符截断
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// LIKE 模式的转义字符
pub const LIKE_ESCAPE: char = '\\';

/// 转义 LIKE 通配符，配合 [`LIKE_ESCAPE`] 使用
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("url", "https://example.com/page").is_ok());
        assert!(validate_http_url("url", "  http://localhost:3000  ").is_ok());
        assert!(validate_http_url("url", "ftp://example.com").is_err());
        assert!(validate_http_url("url", "javascript:alert(1)").is_err());
        assert!(validate_http_url("url", "example.com").is_err());
        assert!(validate_http_url("url", "").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Owner@Example.COM ").unwrap(),
            "owner@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme SEO Partners"), "acme-seo-partners");
        assert_eq!(slugify("  --Rank & Grow!! "), "rank-grow");
        assert_eq!(slugify("日本"), "agency");
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  hi ", 5).unwrap(), "hi");
        assert!(require_text("title", "   ", 5).is_err());
        assert!(require_text("title", "toolong", 5).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }
}
