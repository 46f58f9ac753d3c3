//! E-mail address bone.

use super::string::{load_text, StringBone};
use super::ValueCodec;
use crate::context::RequestContext;
use crate::db::{DbValue, Query};
use crate::error::Result;
use crate::render::BoneParams;
use crate::types::Scalar;
use url::Host;

/// Message used for malformed addresses
pub const INVALID_EMAIL: &str = "Invalid email entered";

const MAX_LENGTH: usize = 256;
const MAX_ACCOUNT_LENGTH: usize = 64;
const MAX_LABEL_LENGTH: usize = 63;
const ACCOUNT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";

/// Check an e-mail address, returning the error message if it's invalid
///
/// The address must be shorter than 256 characters and consist of exactly
/// one account and one domain. The account is at most 64 characters of
/// ASCII letters, digits, `` !#$%&'*+-/=?^_`{|}~. `` or non-ASCII code
/// points. The domain needs a dot-separated top level domain and must be
/// IDNA-encodable. `..` is rejected anywhere.
#[must_use]
pub fn validate_email(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        return Some(crate::validation::NO_VALUE);
    }
    let valid = value.chars().count() < MAX_LENGTH
        && !value.contains("..")
        && value.split_once('@').is_some_and(|(account, domain)| {
            !domain.contains('@') && is_valid_account(account) && is_valid_domain(domain)
        });
    (!valid).then_some(INVALID_EMAIL)
}

fn is_valid_account(account: &str) -> bool {
    !account.is_empty()
        && account.chars().count() <= MAX_ACCOUNT_LENGTH
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ACCOUNT_SPECIALS.contains(c) || !c.is_ascii())
}

fn is_valid_domain(domain: &str) -> bool {
    let Some((sub_domain, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if sub_domain.is_empty() || tld.is_empty() || sub_domain.starts_with('.') {
        return false;
    }
    if sub_domain.contains(' ') || tld.contains(' ') {
        return false;
    }
    is_idna_encodable(sub_domain) && is_idna_encodable(tld)
}

fn is_idna_encodable(part: &str) -> bool {
    match Host::parse(part) {
        Ok(Host::Domain(ascii)) => ascii
            .split('.')
            .all(|label| !label.is_empty() && label.len() <= MAX_LABEL_LENGTH),
        Ok(_) => true,
        Err(_) => false,
    }
}

/// E-mail address; a string bone with address validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailBone {
    inner: StringBone,
}

impl EmailBone {
    /// Case-sensitive address bone
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare and filter without regard to case
    #[must_use]
    pub fn case_insensitive(self) -> Self {
        Self {
            inner: self.inner.case_insensitive(),
        }
    }

    pub(super) fn validate(&self) -> Result<()> {
        self.inner.validate()
    }
}

impl ValueCodec for EmailBone {
    fn type_name(&self) -> &'static str {
        "str.email"
    }

    fn parse(&self, raw: &str, _ctx: &RequestContext) -> std::result::Result<Scalar, String> {
        if let Some(message) = validate_email(raw) {
            return Err(message.to_string());
        }
        self.inner.check_length(raw)?;
        Ok(Scalar::from(raw))
    }

    fn empty_value(&self) -> Option<Scalar> {
        Some(Scalar::from(""))
    }

    fn to_storage(&self, value: &Scalar, indexed: bool, _ctx: &RequestContext) -> DbValue {
        self.inner.store_text(value, indexed)
    }

    fn from_storage(&self, stored: &DbValue, _ctx: &RequestContext) -> Option<Scalar> {
        load_text(stored)
    }

    fn append_filter(
        &self,
        query: &mut Query,
        field: &str,
        suffix: &str,
        value: &Scalar,
        _ctx: &RequestContext,
    ) -> bool {
        self.inner.filter_text(query, field, suffix, value)
    }

    fn render(&self, value: &Scalar) -> serde_json::Value {
        value
            .as_str()
            .map_or(serde_json::Value::Null, serde_json::Value::from)
    }

    fn params(&self) -> BoneParams {
        self.inner.params()
    }
}
