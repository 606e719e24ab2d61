//! The community source build registry.

use std::collections::HashSet;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::package::*;

mod client;
pub use client::RegistryClient;

mod name_index;
pub use name_index::NameIndex;

mod source_info;
pub use source_info::SourceInfo;

#[async_trait]
pub trait Registry: Send + Sync {
	/// Packages whose name contains `query`.
	async fn search(&self, query: &str) -> crate::Result<Vec<RegistryPackage>>;
	/// Metadata for every known package in `names`, unknown names are silently left out.
	async fn bulk_info(&self, names: &[String]) -> crate::Result<Vec<RegistryPackage>>;
	/// The build recipe metadata of a package base.
	async fn source_info(&self, package_base: &str) -> crate::Result<SourceInfo>;
	/// Best effort list of every package name in the registry.
	///
	/// Only tells if a name plausibly exists, never use it for metadata.
	fn local_name_index(&self) -> Arc<HashSet<String>>;
}

/// A package record as returned by the registry RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryPackage {
	pub name: String,
	pub package_base: String,
	pub version: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub depends: Vec<String>,
	#[serde(default)]
	pub make_depends: Vec<String>,
	#[serde(default)]
	pub check_depends: Vec<String>,
	#[serde(default)]
	pub provides: Vec<String>,
	#[serde(default)]
	pub conflicts: Vec<String>,
}

impl From<RegistryPackage> for PackageInfo {
	fn from(value: RegistryPackage) -> Self {
		let parse = |v: Vec<String>| v.iter().map(|s| Relation::parse(s)).collect::<Vec<_>>();
		PackageInfo {
			name: value.name,
			source: PackageSource::Registry,
			version: value.version,
			description: value.description.unwrap_or_default(),
			depends: parse(value.depends),
			make_depends: parse(value.make_depends),
			check_depends: parse(value.check_depends),
			provides: parse(value.provides),
			conflicts: parse(value.conflicts),
			download_size: 0,
			installed_size: 0,
		}
	}
}

impl From<&PackageInfo> for RegistryPackage {
	/// The package base is assumed to match the package name.
	fn from(value: &PackageInfo) -> Self {
		let text = |v: &[Relation]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
		RegistryPackage {
			name: value.name.clone(),
			package_base: value.name.clone(),
			version: value.version.clone(),
			description: Some(value.description.clone()),
			depends: text(&value.depends),
			make_depends: text(&value.make_depends),
			check_depends: text(&value.check_depends),
			provides: text(&value.provides),
			conflicts: text(&value.conflicts),
		}
	}
}

/// Envelope of every RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
	#[serde(default)]
	pub version: u32,
	#[serde(rename = "type")]
	pub response_type: String,
	#[serde(default)]
	pub resultcount: usize,
	#[serde(default)]
	pub results: Vec<RegistryPackage>,
	#[serde(default)]
	pub error: Option<String>,
}

impl RpcResponse {
	pub fn into_results(self) -> crate::Result<Vec<RegistryPackage>> {
		if self.response_type != "error" {
			return Ok(self.results)
		}
		let message = self.error.unwrap_or_else(|| "unknown error".to_string());
		if message.starts_with("Too many") {
			Err(crate::Error::QueryTooBroad)
		} else {
			Err(crate::Error::Registry(message))
		}
	}
}
