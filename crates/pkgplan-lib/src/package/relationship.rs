use std::sync::OnceLock;
use serde::{Serialize, Deserialize};
use super::version::{self, VersionOperator};

/// The `<operator><version>` half of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionConstraint {
	pub operator: VersionOperator,
	pub version: String,
}

impl VersionConstraint {
	pub fn is_satisfied_by(&self, version: &str) -> bool {
		version::compare_with(version, self.operator, &self.version)
	}
}

/// A dependency, conflict or provide expression such as `libfoo>=2.0`.
///
/// The meaning of the constraint depends on where the relation is found,
/// for `provides` an `=` constraint is the version being provided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
	pub name: String,
	pub constraint: Option<VersionConstraint>,
}

fn relation_regex() -> &'static regex::Regex {
	static RE: OnceLock<regex::Regex> = OnceLock::new();
	/* Split at the first operator character, a name containing `=` is cut there */
	RE.get_or_init(|| regex::Regex::new(r"^([^<>=]+)(?:(<=|>=|==|=|<|>)(.*))?$").expect("relation regex is valid"))
}

impl Relation {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), constraint: None }
	}

	pub fn versioned(name: impl Into<String>, operator: VersionOperator, version: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			constraint: Some(VersionConstraint { operator, version: version.into() }),
		}
	}

	/// Parses an expression, anything without a recognised operator is a bare name.
	///
	/// An operator with nothing after it is dropped, `foo>=` is just `foo`.
	pub fn parse(expression: &str) -> Self {
		let expression = expression.trim();
		let Some(captures) = relation_regex().captures(expression) else {
			log::debug!("Relation `{}` has no name, keeping it verbatim", expression);
			return Self::new(expression)
		};

		let name = captures[1].trim().to_string();
		let constraint = match (captures.get(2), captures.get(3)) {
			(Some(op), Some(v)) if !v.as_str().trim().is_empty() => {
				op.as_str().parse::<VersionOperator>().ok().map(|operator| VersionConstraint {
					operator,
					version: v.as_str().trim().to_string(),
				})
			},
			_ => None,
		};

		Self { name, constraint }
	}

	pub fn is_versioned(&self) -> bool {
		self.constraint.is_some()
	}

	/// Checks a concrete version against the constraint, unconstrained relations accept anything.
	pub fn is_satisfied_by(&self, version: &str) -> bool {
		match &self.constraint {
			Some(c) => c.is_satisfied_by(version),
			None => true,
		}
	}

	/// Checks a version offered by a provider.
	///
	/// A provider that doesn't state a version only satisfies unversioned relations.
	pub fn is_satisfied_by_provision(&self, provided_version: Option<&str>) -> bool {
		match (&self.constraint, provided_version) {
			(None, _) => true,
			(Some(c), Some(v)) => c.is_satisfied_by(v),
			(Some(_), None) => false,
		}
	}

	/// For a `provides` entry, the version being provided.
	pub fn provided_version(&self) -> Option<&str> {
		match &self.constraint {
			Some(VersionConstraint { operator: VersionOperator::Eq, version }) => Some(version.as_str()),
			_ => None,
		}
	}
}

impl std::str::FromStr for Relation {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Relation::parse(s))
	}
}

impl From<&str> for Relation {
	fn from(value: &str) -> Self {
		Relation::parse(value)
	}
}

impl std::fmt::Display for Relation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.constraint {
			Some(c) => write!(f, "{}{}{}", self.name, c.operator, c.version),
			None => f.write_str(&self.name),
		}
	}
}
