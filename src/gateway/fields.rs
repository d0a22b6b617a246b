//! Normalized set of upstream metric fields.

// std
use std::{
	hash::{Hash, Hasher},
	sync::OnceLock,
};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Metrics requested when the caller does not pick any.
pub const DEFAULT_FIELDS: [&str; 8] = [
	"reach",
	"cpm",
	"impressions",
	"clicks",
	"cpc",
	"spend",
	"cost_per_inline_link_click",
	"inline_link_clicks",
];

/// Errors emitted when validating field names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum FieldValidationError {
	/// Empty field names are not allowed.
	#[error("Field names cannot be empty.")]
	Empty,
	/// Field names are comma-joined on the wire, so they cannot contain separators.
	#[error("Field name contains whitespace or a comma: {field}.")]
	InvalidCharacter {
		/// The offending field name.
		field: String,
	},
}

/// Deduplicated, sorted list of upstream metric names.
///
/// Sorting keeps equality and the cached [`fingerprint`](Self::fingerprint) independent of
/// the order callers listed the fields in.
pub struct FieldSet {
	fields: Arc<[String]>,
	fingerprint_cache: OnceLock<String>,
}
impl FieldSet {
	/// Creates a normalized field set from any iterator.
	pub fn new<I, S>(fields: I) -> Result<Self, FieldValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self { fields: normalize(fields)?, fingerprint_cache: OnceLock::new() })
	}

	/// Number of distinct fields.
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Returns true if no fields are defined.
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Returns true if the set contains `field`.
	pub fn contains(&self, field: &str) -> bool {
		self.fields.binary_search_by(|candidate| candidate.as_str().cmp(field)).is_ok()
	}

	/// Iterator over normalized field names.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.fields.iter().map(|s| s.as_str())
	}

	/// Comma-joined form sent as the upstream `fields` parameter.
	pub fn joined(&self) -> String {
		self.fields.join(",")
	}

	/// Base64 (no padding) SHA-256 of [`joined`](Self::joined), cached after first use.
	pub fn fingerprint(&self) -> String {
		self.fingerprint_cache.get_or_init(|| compute_fingerprint(&self.fields)).clone()
	}
}
impl Default for FieldSet {
	fn default() -> Self {
		Self {
			fields: Arc::from(sorted(DEFAULT_FIELDS.iter().map(|field| (*field).to_owned()))),
			fingerprint_cache: OnceLock::new(),
		}
	}
}
impl Clone for FieldSet {
	fn clone(&self) -> Self {
		Self { fields: self.fields.clone(), fingerprint_cache: OnceLock::new() }
	}
}
impl PartialEq for FieldSet {
	fn eq(&self, other: &Self) -> bool {
		self.fields == other.fields
	}
}
impl Eq for FieldSet {}
impl Hash for FieldSet {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.fields.hash(state);
	}
}
impl Debug for FieldSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("FieldSet").field(&self.fields).finish()
	}
}
impl Display for FieldSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.joined())
	}
}
impl FromStr for FieldSet {
	type Err = FieldValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.trim().is_empty() {
			return Err(FieldValidationError::Empty);
		}

		Self::new(s.split(',').map(str::trim))
	}
}
impl Serialize for FieldSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.fields.len()))?;

		for field in self.fields.iter() {
			seq.serialize_element(field)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for FieldSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		FieldSet::new(values).map_err(DeError::custom)
	}
}

fn normalize<I, S>(fields: I) -> Result<Arc<[String]>, FieldValidationError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut owned = Vec::new();

	for field in fields {
		let field: String = field.into();

		if field.is_empty() {
			return Err(FieldValidationError::Empty);
		}
		if field.chars().any(|c| c.is_whitespace() || c == ',') {
			return Err(FieldValidationError::InvalidCharacter { field });
		}

		owned.push(field);
	}

	if owned.is_empty() {
		return Err(FieldValidationError::Empty);
	}

	Ok(Arc::from(sorted(owned)))
}

fn sorted(fields: impl IntoIterator<Item = String>) -> Vec<String> {
	fields.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

fn compute_fingerprint(fields: &[String]) -> String {
	let mut hasher = Sha256::new();

	hasher.update(fields.join(",").as_bytes());

	STANDARD_NO_PAD.encode(hasher.finalize())
}
