use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use sha1::{Digest, Sha1};

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

const ATTACHMENT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf", "txt", "doc", "docx"];

// language[-script][-region](-variant)*(-x-private)?
static BCP47_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?i)([a-z]{2,3}(-[a-z]{3}){0,3}|[a-z]{4,8})(-[a-z]{4})?(-([a-z]{2}|[0-9]{3}))?(-([a-z0-9]{5,8}|[0-9][a-z0-9]{3}))*(-x(-[a-z0-9]{1,8})+)?$",
    )
    .expect("Invalid BCP-47 regex")
});

pub(crate) fn is_language_tag(tag: &str) -> bool {
    BCP47_REGEX.is_match(tag)
}

fn is_supported_content_type(content_type: &str) -> bool {
    mime_guess::get_mime_extensions_str(content_type)
        .is_some_and(|exts| exts.iter().any(|e| ATTACHMENT_EXTENSIONS.contains(e)))
}

pub(super) fn validate_attachment(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if record.is_present("data") {
        match record.str("contentType") {
            None => ctx.error("contentType must be populated if data is provided"),
            Some(ct) if !is_supported_content_type(ct) => {
                ctx.error(format!("The uploaded file type {ct} is not supported"))
            }
            Some(_) => {}
        }
    }

    if let Some(language) = record.str("language")
        && !is_language_tag(language)
    {
        ctx.error(format!("language '{language}' is not a valid BCP-47 tag"));
    }

    if let (Some(data), Some(hash)) = (record.str("data"), record.str("hash")) {
        let Ok(bytes) = STANDARD.decode(data) else {
            return;
        };
        let expected = STANDARD.encode(Sha1::digest(&bytes));
        if hash != expected {
            ctx.error("hash must be the base64 SHA-1 digest of data");
        }
    }
}
