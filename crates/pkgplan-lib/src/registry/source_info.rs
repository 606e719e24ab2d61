use std::collections::BTreeMap;
use crate::package::*;

type Fields = BTreeMap<String, Vec<String>>;

/// A parsed `.SRCINFO` build recipe summary.
///
/// Fields set in a `pkgname` section replace the `pkgbase` value of the same key for that package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
	pub package_base: String,
	pub base: Fields,
	pub packages: BTreeMap<String, Fields>,
}

impl SourceInfo {
	pub fn parse(text: &str) -> crate::Result<Self> {
		let mut info = SourceInfo::default();
		let mut section: Option<String> = None;

		for (n, line) in text.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			let Some((key, value)) = line.split_once('=') else {
				return Err(crate::Error::Parse(format!("source info line {} has no `=`: `{}`", n + 1, line)))
			};
			let (key, value) = (key.trim(), value.trim());

			match key {
				"pkgbase" => {
					info.package_base = value.to_string();
					section = None;
				},
				"pkgname" => {
					info.packages.entry(value.to_string()).or_default();
					section = Some(value.to_string());
				},
				_ => {
					let fields = match &section {
						Some(name) => info.packages.entry(name.clone()).or_default(),
						None => &mut info.base,
					};
					let values = fields.entry(key.to_string()).or_default();
					/* `depends =` with no value clears a list inherited from pkgbase */
					if !value.is_empty() {
						values.push(value.to_string());
					}
				},
			}
		}

		if info.package_base.is_empty() {
			return Err(crate::Error::Parse("source info has no pkgbase".to_string()))
		}
		Ok(info)
	}

	/// Looks up a field for a package, falling back to the `pkgbase` section.
	pub fn get(&self, package: &str, key: &str) -> Option<&[String]> {
		self.packages.get(package)
			.and_then(|fields| fields.get(key))
			.or_else(|| self.base.get(key))
			.map(Vec::as_slice)
	}

	/// `epoch:pkgver-pkgrel` as the registry would report it.
	pub fn version(&self, package: &str) -> Option<String> {
		let first = |key| self.get(package, key).and_then(|v| v.first()).cloned();
		let pkgver = first("pkgver")?;
		let pkgrel = first("pkgrel").unwrap_or_else(|| "1".to_string());
		Some(match first("epoch") {
			Some(epoch) if epoch != "0" => format!("{}:{}-{}", epoch, pkgver, pkgrel),
			_ => format!("{}-{}", pkgver, pkgrel),
		})
	}

	fn relations(&self, package: &str, key: &str, architecture: &str) -> Option<Vec<Relation>> {
		let arch_key = format!("{}_{}", key, architecture);
		let common = self.get(package, key);
		let arch = self.get(package, &arch_key);
		if common.is_none() && arch.is_none() {
			return None
		}
		Some(common.into_iter().chain(arch).flatten().map(|s| Relation::parse(s)).collect())
	}

	/// Replaces the relation lists of `info` with the ones declared here, including `<field>_<architecture>` entries.
	///
	/// Lists not mentioned in the recipe are left alone.
	pub fn apply_to(&self, info: &mut PackageInfo, architecture: &str) {
		let name = info.name.clone();
		if let Some(v) = self.relations(&name, "depends", architecture) { info.depends = v; }
		if let Some(v) = self.relations(&name, "makedepends", architecture) { info.make_depends = v; }
		if let Some(v) = self.relations(&name, "checkdepends", architecture) { info.check_depends = v; }
		if let Some(v) = self.relations(&name, "provides", architecture) { info.provides = v; }
		if let Some(v) = self.relations(&name, "conflicts", architecture) { info.conflicts = v; }
		if info.description.is_empty() {
			if let Some(desc) = self.get(&name, "pkgdesc").and_then(|v| v.first()) {
				info.description = desc.clone();
			}
		}
	}
}
