use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

pub const SIGNATURE_CONTENT_TYPES: &[&str] = &["application/jwt", "image/jpeg"];

/// `blob` carries a compact JWS, base64 encoded. Only the header is decoded;
/// the signature is not verified.
fn is_signed_token(blob: &str) -> bool {
    let Ok(bytes) = STANDARD.decode(blob) else {
        return false;
    };
    let Ok(token) = std::str::from_utf8(&bytes) else {
        return false;
    };
    jsonwebtoken::decode_header(token.trim()).is_ok()
}

pub(super) fn validate_signature(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if let Some(ct) = record.str("contentType")
        && !SIGNATURE_CONTENT_TYPES.contains(&ct)
    {
        ctx.field_error(
            "contentType",
            format!(
                "The signature content type should be one of {}",
                SIGNATURE_CONTENT_TYPES.join(", ")
            ),
        );
    }

    if let Some(blob) = record.str("blob")
        && !is_signed_token(blob)
    {
        ctx.field_error("blob", "The blob provided is not a valid jwt encoded signature");
    }

    if record.is_present("whoUri") == record.is_present("whoReference") {
        ctx.error("Exactly one of whoUri or whoReference must be provided");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::coerce_as;
    use serde_json::json;

    // {"alg":"HS256","typ":"JWT"}.{"sub":"1"}.sig
    const TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxIn0.c2ln";

    fn blob() -> String {
        STANDARD.encode(TOKEN)
    }

    fn signature(content_type: &str, blob: &str) -> serde_json::Value {
        json!({
            "type": [{"system": "http://hl7.org/fhir/valueset-signature-type", "code": "1.2.840.10065.1.12.1.1"}],
            "when": "2016-03-18T10:00:00Z",
            "whoUri": "http://example.org/practitioner/1",
            "contentType": content_type,
            "blob": blob,
        })
    }

    #[test]
    fn decodes_token_header() {
        assert!(is_signed_token(&blob()));
        assert!(!is_signed_token(&STANDARD.encode("not a token")));
        assert!(!is_signed_token("%%%"));
    }

    #[test]
    fn valid_signature_queues_type_lookup() {
        let ok = coerce_as("Signature", signature("application/jwt", &blob())).unwrap();
        assert_eq!(ok.checks.len(), 1);
        assert_eq!(ok.checks[0].valueset, "signature_type");
    }

    #[test]
    fn rejects_content_type_and_blob() {
        let errs = coerce_as(
            "Signature",
            signature("text/plain", &STANDARD.encode("plain text")),
        )
        .unwrap_err();
        assert!(errs.mentions("should be one of application/jwt, image/jpeg"));
        assert!(errs.mentions("not a valid jwt"));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn signer_must_be_given_once() {
        let mut value = signature("application/jwt", &blob());
        value["whoReference"] = json!({"reference": "Patient/1"});
        let errs = coerce_as("Signature", value).unwrap_err();
        assert!(errs.mentions("Exactly one of whoUri or whoReference"));
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let errs = coerce_as("Signature", json!({})).unwrap_err();
        for field in ["type", "when", "contentType", "blob"] {
            assert!(errs.mentions(&format!("Field {field} in column Signature not nullable")));
        }
    }
}
