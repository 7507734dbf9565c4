use axum::http::{header, HeaderMap, HeaderValue};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const COOKIE_NAME: &str = "flash";
const FLASH_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot status message carried across the post-submit redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
struct FlashClaims {
    kind: FlashKind,
    msg: String,
    exp: i64,
}

/// Signs and verifies the flash cookie. The browser carries the message;
/// the signature stops it from being forged or reworded.
#[derive(Clone)]
pub struct FlashSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl FlashSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// `Set-Cookie` value carrying the signed message.
    pub fn set_cookie(&self, kind: FlashKind, message: &str) -> Option<HeaderValue> {
        let claims = FlashClaims {
            kind,
            msg: message.to_string(),
            exp: Utc::now().timestamp() + FLASH_TTL_SECS,
        };
        let token = encode(&Header::default(), &claims, &self.encoding).ok()?;
        HeaderValue::from_str(&format!(
            "{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={FLASH_TTL_SECS}"
        ))
        .ok()
    }

    /// `Set-Cookie` value that clears the message once shown.
    pub fn clear_cookie(&self) -> HeaderValue {
        HeaderValue::from_static("flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }

    /// Reads the flash message from the request, ignoring missing, expired
    /// or tampered tokens.
    pub fn read(&self, headers: &HeaderMap) -> Option<FlashMessage> {
        let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
        let token = cookies.split(';').find_map(|part| {
            part.trim().strip_prefix(COOKIE_NAME)?.strip_prefix('=')
        })?;
        let data = decode::<FlashClaims>(token, &self.decoding, &Validation::default()).ok()?;
        Some(FlashMessage {
            kind: data.claims.kind,
            message: data.claims.msg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn round_trips_a_message() {
        let signer = FlashSigner::new("test-secret");
        let cookie = signer
            .set_cookie(FlashKind::Success, "Takk! Påmeldingen er registrert.")
            .unwrap();
        let token = cookie.to_str().unwrap().split(';').next().unwrap().to_string();

        let flash = signer.read(&headers_with_cookie(&token)).unwrap();
        assert_eq!(flash.kind, FlashKind::Success);
        assert_eq!(flash.message, "Takk! Påmeldingen er registrert.");
    }

    #[test]
    fn ignores_tampered_tokens() {
        let signer = FlashSigner::new("test-secret");
        let cookie = signer.set_cookie(FlashKind::Error, "nope").unwrap();
        let mut token = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        token.push('x');
        assert_eq!(signer.read(&headers_with_cookie(&token)), None);
    }

    #[test]
    fn ignores_tokens_signed_with_other_key() {
        let signer = FlashSigner::new("test-secret");
        let other = FlashSigner::new("other-secret");
        let cookie = other.set_cookie(FlashKind::Success, "forged").unwrap();
        let token = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        assert_eq!(signer.read(&headers_with_cookie(&token)), None);
    }

    #[test]
    fn missing_cookie_reads_as_none() {
        let signer = FlashSigner::new("test-secret");
        assert_eq!(signer.read(&HeaderMap::new()), None);
        assert_eq!(signer.read(&headers_with_cookie("session=abc")), None);
    }

    #[test]
    fn finds_flash_among_other_cookies() {
        let signer = FlashSigner::new("test-secret");
        let cookie = signer.set_cookie(FlashKind::Error, "Ugyldig alder.").unwrap();
        let token = cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let combined = format!("session=abc; {token}; theme=dark");
        let flash = signer.read(&headers_with_cookie(&combined)).unwrap();
        assert_eq!(flash.message, "Ugyldig alder.");
    }
}
