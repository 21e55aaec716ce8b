//! Catalog classes: the free-text categories shown next to domains.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Three-letter class codes accepted by `set-class`.
const CLASS_CODES: &[(&str, &str)] = &[
  ("tec", "Technology"),
  ("edu", "Education"),
  ("asi", "Asia Technology"),
  ("fin", "Finance"),
  ("gov", "Government"),
  ("man", "Manufacturing"),
  ("med", "Media"),
  ("ngo", "NGO"),
  ("ret", "Retail"),
  ("tel", "Telecom"),
];

/// Resolve a three-letter code (case-insensitive) to its class name.
pub fn class_for_code(code: &str) -> Result<&'static str> {
  let code = code.to_ascii_lowercase();
  CLASS_CODES
    .iter()
    .find(|(c, _)| *c == code)
    .map(|(_, name)| *name)
    .ok_or(Error::UnknownClass(code))
}

/// Parse a `domain,xyz` setting into the domain name and class name.
pub fn parse_class_setting(setting: &str) -> Result<(String, &'static str)> {
  let (domain, code) = setting
    .split_once(',')
    .ok_or_else(|| Error::InvalidClassSetting(setting.to_owned()))?;
  if domain.is_empty() || code.len() != 3 {
    return Err(Error::InvalidClassSetting(setting.to_owned()));
  }
  Ok((domain.to_owned(), class_for_code(code)?))
}

/// Flatten a `{"Class": ["domain", ...]}` document into `(domain, class)`
/// pairs, ordered by class then by position in the list.
pub fn parse_class_map(json: &str) -> Result<Vec<(String, String)>> {
  let map: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
  Ok(
    map
      .into_iter()
      .flat_map(|(class, names)| {
        names.into_iter().map(move |name| (name, class.clone()))
      })
      .collect(),
  )
}
