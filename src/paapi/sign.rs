//! AWS SigV4 request signing for the product-advertising API.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "ProductAdvertisingAPI";
const SIGNED_HEADERS: &str = "content-encoding;content-type;host;x-amz-date;x-amz-target";

pub(crate) struct SignedRequest {
    pub authorization: String,
    pub amz_date: String,
}

/// Produce the `Authorization` header for one POST.
///
/// The header list is fixed; it must match the headers the client actually
/// sends, byte for byte, or the vendor rejects the signature.
pub(crate) fn sign(
    access_key: &str,
    secret_key: &str,
    region: &str,
    host: &str,
    path: &str,
    amz_target: &str,
    payload: &str,
    now: DateTime<Utc>,
) -> SignedRequest {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let payload_hash = hex::encode(Sha256::digest(payload.as_bytes()));

    let canonical_headers = format!(
        "content-encoding:amz-1.0\n\
         content-type:application/json; charset=utf-8\n\
         host:{host}\n\
         x-amz-date:{amz_date}\n\
         x-amz-target:{amz_target}\n"
    );

    let canonical_request =
        format!("POST\n{path}\n\n{canonical_headers}\n{SIGNED_HEADERS}\n{payload_hash}");

    let scope = format!("{date_stamp}/{region}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac_chain(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_chain(&k_date, region.as_bytes());
    let k_service = hmac_chain(&k_region, SERVICE.as_bytes());
    let k_signing = hmac_chain(&k_service, b"aws4_request");
    let signature = hex::encode(hmac_chain(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{scope}, \
         SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
    );

    SignedRequest {
        authorization,
        amz_date,
    }
}

fn hmac_chain(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac key");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
