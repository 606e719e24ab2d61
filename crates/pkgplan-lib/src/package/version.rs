//! Version strings in the `epoch:version-release` form.

use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

/// A comparable run of either digits or letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
	/// Digits with leading zeros removed, `"0"` for zero.
	/// Kept as text so runs longer than any integer type still compare numerically.
	Number(String),
	Text(String),
}

impl Segment {
	fn number(digits: &str) -> Self {
		let trimmed = digits.trim_start_matches('0');
		Segment::Number(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
	}
}

impl Ord for Segment {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Segment::Number(a), Segment::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
			(Segment::Text(a), Segment::Text(b)) => a.cmp(b),
			(Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
			(Segment::Text(_), Segment::Number(_)) => Ordering::Less,
		}
	}
}

impl PartialOrd for Segment {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// A version with its defaults filled in, ready for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedVersion {
	pub epoch: u64,
	pub segments: Vec<Segment>,
	pub release: Vec<Segment>,
}

impl NormalizedVersion {
	/// Missing epochs become `0` and missing releases `1`.
	///
	/// Returns `None` for strings that can't be ordered reliably, such as a non-numeric epoch or an empty version.
	pub fn parse(version: &str) -> Option<Self> {
		let version = version.trim();
		let (epoch, rest) = match version.split_once(':') {
			Some(("", rest)) => (0, rest),
			Some((epoch, rest)) => (epoch.parse::<u64>().ok()?, rest),
			None => (0, version),
		};
		let (upstream, release) = rest.rsplit_once('-').unwrap_or((rest, "1"));

		let mut segments = tokenize(upstream);
		if segments.is_empty() {
			return None
		}
		/* Versions like `r8.abc` are treated as `0.r8.abc` so they sort below any numbered release */
		if !upstream.starts_with(|c: char| c.is_ascii_digit()) {
			segments.insert(0, Segment::number("0"));
		}

		let release = tokenize(release);
		if release.is_empty() {
			return None
		}

		Some(Self { epoch, segments, release })
	}
}

impl Ord for NormalizedVersion {
	fn cmp(&self, other: &Self) -> Ordering {
		self.epoch.cmp(&other.epoch)
			.then_with(|| compare_segments(&self.segments, &other.segments))
			.then_with(|| compare_segments(&self.release, &other.release))
	}
}

impl PartialOrd for NormalizedVersion {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Splits on anything that is not a letter or digit, then separates letter runs from digit runs.
fn tokenize(s: &str) -> Vec<Segment> {
	let mut out = Vec::new();
	let mut current = String::new();
	let mut digits = false;

	let flush = |current: &mut String, digits: bool, out: &mut Vec<Segment>| {
		if !current.is_empty() {
			out.push(if digits { Segment::number(current) } else { Segment::Text(current.clone()) });
			current.clear();
		}
	};

	for c in s.chars() {
		if c.is_ascii_digit() {
			if !digits { flush(&mut current, digits, &mut out); }
			digits = true;
			current.push(c);
		} else if c.is_alphabetic() {
			if digits { flush(&mut current, digits, &mut out); }
			digits = false;
			current.push(c);
		} else {
			flush(&mut current, digits, &mut out);
		}
	}
	flush(&mut current, digits, &mut out);
	out
}

fn compare_segments(lhs: &[Segment], rhs: &[Segment]) -> Ordering {
	for (l, r) in lhs.iter().zip(rhs) {
		match l.cmp(r) {
			Ordering::Equal => {},
			ord => return ord,
		}
	}

	/* A trailing letter run marks a pre-release, `1.0rc1` is older than `1.0` */
	match (lhs.get(rhs.len()), rhs.get(lhs.len())) {
		(Some(Segment::Text(_)), _) => Ordering::Less,
		(Some(Segment::Number(_)), _) => Ordering::Greater,
		(None, Some(Segment::Text(_))) => Ordering::Greater,
		(None, Some(Segment::Number(_))) => Ordering::Less,
		(None, None) => Ordering::Equal,
	}
}

/// Comparison operator of a versioned relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VersionOperator {
	/// Both `=` and `==`.
	Eq,
	Lt,
	Le,
	Gt,
	Ge,
}

impl VersionOperator {
	pub fn matches(self, ordering: Ordering) -> bool {
		match self {
			VersionOperator::Eq => ordering == Ordering::Equal,
			VersionOperator::Lt => ordering == Ordering::Less,
			VersionOperator::Le => ordering != Ordering::Greater,
			VersionOperator::Gt => ordering == Ordering::Greater,
			VersionOperator::Ge => ordering != Ordering::Less,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			VersionOperator::Eq => "=",
			VersionOperator::Lt => "<",
			VersionOperator::Le => "<=",
			VersionOperator::Gt => ">",
			VersionOperator::Ge => ">=",
		}
	}
}

impl std::str::FromStr for VersionOperator {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"=" | "==" => Ok(VersionOperator::Eq),
			"<" => Ok(VersionOperator::Lt),
			"<=" => Ok(VersionOperator::Le),
			">" => Ok(VersionOperator::Gt),
			">=" => Ok(VersionOperator::Ge),
			_ => Err(crate::Error::Parse(format!("unknown version operator `{}`", s))),
		}
	}
}

impl std::fmt::Display for VersionOperator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Shorthand for [`NormalizedVersion::parse`].
pub fn normalize(version: &str) -> Option<NormalizedVersion> {
	NormalizedVersion::parse(version)
}

/// Orders two version strings, falling back to plain string order when either is malformed.
pub fn compare_versions(lhs: &str, rhs: &str) -> Ordering {
	match (normalize(lhs), normalize(rhs)) {
		(Some(l), Some(r)) => l.cmp(&r),
		_ => {
			log::warn!("Malformed version in comparison `{}` vs `{}`, comparing as strings", lhs, rhs);
			lhs.cmp(rhs)
		}
	}
}

/// Checks `current <operator> required`.
///
/// Never fails. Unknown operators don't match, and malformed versions can only match through equality.
pub fn compare(current: &str, operator: &str, required: &str) -> bool {
	match operator.parse::<VersionOperator>() {
		Ok(op) => compare_with(current, op, required),
		Err(e) => {
			log::warn!("{}", e);
			false
		}
	}
}

pub fn compare_with(current: &str, operator: VersionOperator, required: &str) -> bool {
	match (normalize(current), normalize(required)) {
		(Some(c), Some(r)) => operator.matches(c.cmp(&r)),
		_ => {
			log::warn!("Malformed version in `{} {} {}`, comparing as strings", current, operator, required);
			operator == VersionOperator::Eq && current.trim() == required.trim()
		}
	}
}
