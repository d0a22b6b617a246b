//! Inbound query model and the validated upstream request derived from it.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, error::GatewayError, gateway::FieldSet};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Raw query as received from callers; nothing here is trusted until converted into an
/// [`UpstreamRequestSpec`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsQuery {
	/// Upstream object identifier (account, campaign, or ad set id).
	pub id: String,
	/// Requested aggregation level, matched case-insensitively.
	pub level: String,
	/// Inclusive start date, `YYYY-MM-DD`.
	pub start_date: String,
	/// Inclusive end date, `YYYY-MM-DD`.
	pub end_date: String,
}
impl InsightsQuery {
	/// Bundles the four query parameters.
	pub fn new(
		id: impl Into<String>,
		level: impl Into<String>,
		start_date: impl Into<String>,
		end_date: impl Into<String>,
	) -> Self {
		Self {
			id: id.into(),
			level: level.into(),
			start_date: start_date.into(),
			end_date: end_date.into(),
		}
	}
}

/// Granularity at which upstream metrics are aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationLevel {
	/// Whole ad account.
	Account,
	/// Per campaign.
	Campaign,
	/// Per ad set.
	Adset,
}
impl AggregationLevel {
	/// Wire label sent as the upstream `level` parameter.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Account => "account",
			Self::Campaign => "campaign",
			Self::Adset => "adset",
		}
	}
}
impl Display for AggregationLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AggregationLevel {
	type Err = GatewayError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"account" => Ok(Self::Account),
			"campaign" => Ok(Self::Campaign),
			"adset" => Ok(Self::Adset),
			_ => Err(GatewayError::invalid_input(format!(
				"level `{s}` is not one of account, campaign, adset"
			))),
		}
	}
}

/// Inclusive calendar date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateRange {
	/// First day included.
	pub start: Date,
	/// Last day included.
	pub end: Date,
}
impl DateRange {
	/// Creates a range, rejecting `start > end`.
	pub fn new(start: Date, end: Date) -> Result<Self, GatewayError> {
		if start > end {
			return Err(GatewayError::invalid_input(format!(
				"start_date {start} is after end_date {end}"
			)));
		}

		Ok(Self { start, end })
	}

	/// Parses two `YYYY-MM-DD` strings.
	pub fn parse(start: &str, end: &str) -> Result<Self, GatewayError> {
		Self::new(parse_date("start_date", start)?, parse_date("end_date", end)?)
	}

	/// JSON object sent as the upstream `time_range` parameter.
	pub fn time_range_json(&self) -> String {
		format!(r#"{{"since":"{}","until":"{}"}}"#, self.start, self.end)
	}
}

/// Validated upstream query; the only input [`InsightsGateway`](crate::gateway::InsightsGateway)
/// dispatches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpstreamRequestSpec {
	/// Upstream object identifier.
	pub target_id: String,
	/// Aggregation level.
	pub aggregation_level: AggregationLevel,
	/// Reporting window.
	pub date_range: DateRange,
	/// Metrics to request.
	pub requested_fields: FieldSet,
}
impl UpstreamRequestSpec {
	/// Replaces the requested metrics.
	pub fn with_fields(mut self, fields: FieldSet) -> Self {
		self.requested_fields = fields;

		self
	}

	/// Stable cache key: base64 (no padding) SHA-256 of the canonical request.
	pub fn fingerprint(&self) -> String {
		let canonical = format!(
			"{}\n{}\n{}\n{}\n{}",
			self.target_id,
			self.aggregation_level,
			self.date_range.start,
			self.date_range.end,
			self.requested_fields.joined(),
		);
		let mut hasher = Sha256::new();

		hasher.update(canonical.as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl TryFrom<InsightsQuery> for UpstreamRequestSpec {
	type Error = GatewayError;

	fn try_from(query: InsightsQuery) -> Result<Self, Self::Error> {
		let aggregation_level = query.level.parse::<AggregationLevel>()?;
		let target_id = query.id.trim();

		if target_id.is_empty() {
			return Err(GatewayError::invalid_input("id cannot be empty"));
		}
		if target_id.chars().any(|c| c.is_whitespace() || c == '/') {
			return Err(GatewayError::invalid_input(format!(
				"id `{target_id}` contains whitespace or a path separator"
			)));
		}

		Ok(Self {
			target_id: target_id.to_owned(),
			aggregation_level,
			date_range: DateRange::parse(&query.start_date, &query.end_date)?,
			requested_fields: FieldSet::default(),
		})
	}
}

fn parse_date(name: &str, value: &str) -> Result<Date, GatewayError> {
	Date::parse(value.trim(), DATE_FORMAT).map_err(|_| {
		GatewayError::invalid_input(format!("{name} `{value}` is not a YYYY-MM-DD date"))
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn spec(level: &str) -> Result<UpstreamRequestSpec, GatewayError> {
		InsightsQuery::new("123", level, "2025-01-01", "2025-01-31").try_into()
	}

	#[test]
	fn level_is_case_insensitive() {
		let spec = spec("Campaign").expect("Mixed-case level should be accepted.");

		assert_eq!(spec.aggregation_level, AggregationLevel::Campaign);
		assert_eq!(spec.date_range.start, macros::date!(2025-01-01));
		assert_eq!(spec.date_range.time_range_json(), r#"{"since":"2025-01-01","until":"2025-01-31"}"#);
	}

	#[test]
	fn malformed_queries_are_invalid_input() {
		assert!(matches!(spec("weekly"), Err(GatewayError::InvalidInput { .. })));
		assert!(matches!(
			UpstreamRequestSpec::try_from(InsightsQuery::new(" ", "account", "2025-01-01", "2025-01-02")),
			Err(GatewayError::InvalidInput { .. })
		));
		assert!(matches!(
			UpstreamRequestSpec::try_from(InsightsQuery::new("1", "account", "2025-13-01", "2025-01-02")),
			Err(GatewayError::InvalidInput { .. })
		));
		assert!(matches!(
			UpstreamRequestSpec::try_from(InsightsQuery::new("1", "account", "2025-02-01", "2025-01-02")),
			Err(GatewayError::InvalidInput { .. })
		));
	}

	#[test]
	fn fingerprint_tracks_every_component() {
		let base = spec("account").expect("Fixture query should be valid.");
		let same = spec("ACCOUNT").expect("Fixture query should be valid.");
		let other_level = spec("adset").expect("Fixture query should be valid.");
		let other_fields = base
			.clone()
			.with_fields(FieldSet::new(["reach"]).expect("Fixture fields should be valid."));

		assert_eq!(base.fingerprint(), same.fingerprint());
		assert_ne!(base.fingerprint(), other_level.fingerprint());
		assert_ne!(base.fingerprint(), other_fields.fingerprint());
	}
}
