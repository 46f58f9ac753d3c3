//! Lifting of single-value codecs into the four bone layouts.
//!
//! Everything here is written once against [`ValueCodec`] so every bone type
//! gets repeated and per-language variants for free. Localized layouts always
//! carry exactly the configured language keys.

use super::Bone;
use crate::context::RequestContext;
use crate::db::{DbValue, Query};
use crate::request::{ClientValue, RequestData};
use crate::types::{BoneValue, Scalar, ValueCache};
use crate::validation::{ErrorSeverity, FieldError, ValidationErrors, ValidationResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub(super) fn from_client(
    bone: &Bone,
    cache: &mut ValueCache,
    name: &str,
    data: &RequestData,
    ctx: &RequestContext,
) -> ValidationResult<()> {
    let mut errors = ValidationErrors::new();
    let value = match (bone.languages(), bone.is_multiple()) {
        (None, false) => BoneValue::Single(
            read_single(bone, name, data.get(name), ctx, &mut errors)
                .or_else(|| bone.codec().empty_value()),
        ),
        (None, true) => BoneValue::Multiple(read_multiple(bone, name, data.get(name), ctx, &mut errors)),
        (Some(languages), false) => BoneValue::Languages(
            languages
                .iter()
                .map(|lang| {
                    let path = format!("{name}.{lang}");
                    let value = read_single(bone, &path, data.get(&path), ctx, &mut errors);
                    (lang.clone(), value)
                })
                .collect(),
        ),
        (Some(languages), true) => BoneValue::MultipleLanguages(
            languages
                .iter()
                .map(|lang| {
                    let path = format!("{name}.{lang}");
                    let values = read_multiple(bone, &path, data.get(&path), ctx, &mut errors);
                    (lang.clone(), values)
                })
                .collect(),
        ),
    };

    if errors.is_empty() && bone.is_required() && !has_value(bone, &value) {
        if was_submitted(bone, name, data) {
            errors.add(FieldError::empty(name));
        } else {
            errors.add(FieldError::not_set(name));
        }
    }

    if errors.is_empty() {
        cache.set(name, value);
        Ok(())
    } else {
        debug!(bone = name, errors = errors.len(), "Rejected client value");
        cache.set(name, bone.empty_value());
        Err(errors)
    }
}

fn read_single(
    bone: &Bone,
    path: &str,
    raw: Option<&ClientValue>,
    ctx: &RequestContext,
    errors: &mut ValidationErrors,
) -> Option<Scalar> {
    match raw? {
        ClientValue::Text(raw) if raw.trim().is_empty() => None,
        ClientValue::Text(raw) => parse_checked(bone, path, raw, ctx, errors),
        ClientValue::List(_) => {
            errors.add(FieldError::invalid(path));
            None
        }
    }
}

fn read_multiple(
    bone: &Bone,
    path: &str,
    raw: Option<&ClientValue>,
    ctx: &RequestContext,
    errors: &mut ValidationErrors,
) -> Vec<Scalar> {
    let items: Vec<&str> = match raw {
        None => return Vec::new(),
        Some(ClientValue::Text(raw)) => vec![raw.as_str()],
        Some(ClientValue::List(raw)) => raw.iter().map(String::as_str).collect(),
    };
    items
        .into_iter()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .filter_map(|(idx, raw)| parse_checked(bone, &format!("{path}.{idx}"), raw, ctx, errors))
        .collect()
}

fn parse_checked(
    bone: &Bone,
    path: &str,
    raw: &str,
    ctx: &RequestContext,
    errors: &mut ValidationErrors,
) -> Option<Scalar> {
    let checked = bone
        .codec()
        .parse(raw, ctx)
        .and_then(|value| bone.validate_value(&value).map_or(Ok(value), Err));
    match checked {
        Ok(value) => Some(value),
        Err(message) => {
            errors.add(FieldError::new(path, message, ErrorSeverity::Invalid));
            None
        }
    }
}

fn has_value(bone: &Bone, value: &BoneValue) -> bool {
    value.scalars().any(|v| !bone.codec().is_empty(v))
}

fn was_submitted(bone: &Bone, name: &str, data: &RequestData) -> bool {
    data.contains_key(name)
        || bone
            .languages()
            .unwrap_or_default()
            .iter()
            .any(|lang| data.contains_key(&format!("{name}.{lang}")))
}

pub(super) fn serialize(
    bone: &Bone,
    value: Option<&BoneValue>,
    name: &str,
    ctx: &RequestContext,
) -> DbValue {
    let value = match value {
        Some(value) if bone.has_layout(value) => Cow::Borrowed(value),
        Some(_) => {
            warn!(bone = name, "Cached value doesn't match the bone layout, storing empty");
            Cow::Owned(bone.empty_value())
        }
        None => Cow::Owned(bone.empty_value()),
    };
    let codec = bone.codec();
    let indexed = bone.is_indexed();
    let store = |v: &Scalar| codec.to_storage(v, indexed, ctx);
    let store_all = |values: &[Scalar]| DbValue::List(values.iter().map(store).collect());
    let languages = bone.languages().unwrap_or_default();

    match &*value {
        BoneValue::Single(value) => value.as_ref().map_or(DbValue::Null, store),
        BoneValue::Multiple(values) => store_all(values),
        BoneValue::Languages(map) => DbValue::Map(
            languages
                .iter()
                .map(|lang| {
                    let stored = map
                        .get(lang)
                        .and_then(Option::as_ref)
                        .map_or(DbValue::Null, store);
                    (lang.clone(), stored)
                })
                .collect(),
        ),
        BoneValue::MultipleLanguages(map) => DbValue::Map(
            languages
                .iter()
                .map(|lang| {
                    let stored = map.get(lang).map_or(&[][..], Vec::as_slice);
                    (lang.clone(), store_all(stored))
                })
                .collect(),
        ),
    }
}

pub(super) fn unserialize(
    bone: &Bone,
    stored: Option<&DbValue>,
    name: &str,
    ctx: &RequestContext,
) -> BoneValue {
    let Some(stored) = stored else {
        return bone.empty_value();
    };
    let Some(languages) = bone.languages() else {
        return if bone.is_multiple() {
            BoneValue::Multiple(load_many(bone, stored, name, ctx))
        } else {
            BoneValue::Single(load_first(bone, stored, name, ctx))
        };
    };

    // Values stored before the bone was localized belong to the first language
    let per_language: Cow<'_, BTreeMap<String, DbValue>> = match stored {
        DbValue::Map(map) if is_language_map(map, languages) => Cow::Borrowed(map),
        DbValue::Null => Cow::Owned(BTreeMap::new()),
        other => Cow::Owned(
            languages
                .first()
                .map(|lang| (lang.clone(), other.clone()))
                .into_iter()
                .collect(),
        ),
    };

    if bone.is_multiple() {
        BoneValue::MultipleLanguages(
            languages
                .iter()
                .map(|lang| {
                    let values = per_language
                        .get(lang)
                        .map(|v| load_many(bone, v, name, ctx))
                        .unwrap_or_default();
                    (lang.clone(), values)
                })
                .collect(),
        )
    } else {
        BoneValue::Languages(
            languages
                .iter()
                .map(|lang| {
                    let value = per_language
                        .get(lang)
                        .and_then(|v| load_first(bone, v, name, ctx));
                    (lang.clone(), value)
                })
                .collect(),
        )
    }
}

fn is_language_map(map: &BTreeMap<String, DbValue>, languages: &[String]) -> bool {
    map.is_empty() || map.keys().any(|key| languages.contains(key))
}

fn load_one(bone: &Bone, stored: &DbValue, name: &str, ctx: &RequestContext) -> Option<Scalar> {
    let value = bone.codec().from_storage(stored, ctx);
    if value.is_none() && !stored.is_null() {
        warn!(
            bone = name,
            stored = stored.type_name(),
            "Unrecognized stored value, treating as unavailable"
        );
    }
    value
}

fn load_first(bone: &Bone, stored: &DbValue, name: &str, ctx: &RequestContext) -> Option<Scalar> {
    match stored {
        DbValue::List(values) => values.first().and_then(|v| load_one(bone, v, name, ctx)),
        other => load_one(bone, other, name, ctx),
    }
}

fn load_many(bone: &Bone, stored: &DbValue, name: &str, ctx: &RequestContext) -> Vec<Scalar> {
    match stored {
        DbValue::Null => Vec::new(),
        DbValue::List(values) => values
            .iter()
            .filter_map(|v| load_one(bone, v, name, ctx))
            .collect(),
        other => load_one(bone, other, name, ctx).into_iter().collect(),
    }
}

pub(super) fn build_filter(
    bone: &Bone,
    name: &str,
    query: &mut Query,
    raw_filter: &RequestData,
    ctx: &RequestContext,
) {
    if !bone.is_indexed() {
        return;
    }
    for (key, raw) in raw_filter.iter() {
        let Some((lang, suffix)) = split_filter_key(name, key) else {
            continue;
        };
        let Some(field) = filter_field(bone, name, lang, ctx) else {
            debug!(bone = name, key, "Filter key doesn't address a configured language");
            continue;
        };
        let ClientValue::Text(raw) = raw else {
            debug!(bone = name, key, "Skipping repeated filter value");
            continue;
        };
        if raw.trim().is_empty() {
            continue;
        }

        let parsed = bone
            .codec()
            .parse(raw, ctx)
            .and_then(|value| bone.validate_value(&value).map_or(Ok(value), Err));
        match parsed {
            Ok(value) => {
                if !bone.codec().append_filter(query, &field, suffix, &value, ctx) {
                    debug!(bone = name, key, "Unsupported filter operator");
                }
            }
            Err(reason) => debug!(bone = name, key, %reason, "Skipping invalid filter value"),
        }
    }
}

/// Split `name.lang$op` into `(Some(lang), "$op")`; `None` if `key` is another field
fn split_filter_key<'k>(name: &str, key: &'k str) -> Option<(Option<&'k str>, &'k str)> {
    let rest = key.strip_prefix(name)?;
    if let Some(localized) = rest.strip_prefix('.') {
        let (lang, suffix) = localized
            .find('$')
            .map_or((localized, ""), |idx| localized.split_at(idx));
        return (!lang.is_empty()).then_some((Some(lang), suffix));
    }
    (rest.is_empty() || rest.starts_with('$')).then_some((None, rest))
}

fn filter_field(bone: &Bone, name: &str, lang: Option<&str>, ctx: &RequestContext) -> Option<String> {
    match (bone.languages(), lang) {
        (None, None) => Some(name.to_string()),
        (None, Some(_)) => None,
        (Some(languages), Some(lang)) => languages
            .iter()
            .any(|l| l == lang)
            .then(|| format!("{name}.{lang}")),
        (Some(languages), None) => {
            let lang = ctx.conf().resolve_alias(ctx.language());
            languages
                .iter()
                .any(|l| l == lang)
                .then(|| format!("{name}.{lang}"))
        }
    }
}
