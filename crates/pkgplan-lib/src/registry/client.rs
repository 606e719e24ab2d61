use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use super::*;
use crate::Error;

/// [`Registry`] over the AUR RPC v5 interface.
#[derive(Debug)]
pub struct RegistryClient {
	client: reqwest::Client,
	base_url: String,
	chunk_size: usize,
	refresh_period: Duration,
	index: NameIndex,
}

impl RegistryClient {
	pub fn new(options: &crate::PlannerOptions) -> crate::Result<Self> {
		let client = reqwest::Client::builder()
			.https_only(options.https_only())
			.timeout(options.request_timeout())
			.build()?;

		Ok(Self {
			client,
			base_url: options.registry_url().to_string(),
			chunk_size: options.registry_chunk_size(),
			refresh_period: options.name_index_refresh(),
			index: NameIndex::default(),
		})
	}

	pub fn name_index(&self) -> &NameIndex {
		&self.index
	}

	fn endpoint(&self, segments: &[&str]) -> crate::Result<reqwest::Url> {
		let mut url = reqwest::Url::parse(&self.base_url)
			.map_err(|e| Error::Registry(format!("invalid registry url `{}`: {}", self.base_url, e)))?;
		url.path_segments_mut()
			.map_err(|_| Error::Registry(format!("registry url `{}` can't take a path", self.base_url)))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	async fn rpc(&self, request: reqwest::RequestBuilder) -> crate::Result<Vec<RegistryPackage>> {
		let response = request.send().await?.error_for_status()?;
		let response: RpcResponse = response.json().await?;
		response.into_results()
	}

	/// Downloads the full package name listing and swaps it into the name index.
	pub async fn refresh_name_index(&self) -> crate::Result<usize> {
		let url = self.endpoint(&["packages.gz"])?;
		let bytes = self.client.get(url).send().await?.error_for_status()?.bytes().await?;

		let mut text = String::new();
		flate2::read::GzDecoder::new(bytes.as_ref()).read_to_string(&mut text)?;

		let names = text.lines()
			.map(str::trim)
			.filter(|l| !l.is_empty() && !l.starts_with('#'))
			.map(str::to_string)
			.collect::<HashSet<_>>();

		let count = self.index.replace(names);
		log::debug!("Registry name index refreshed with {} names", count);
		Ok(count)
	}

	/// Refreshes the name index every [`PlannerOptions::name_index_refresh`](crate::PlannerOptions::name_index_refresh)
	/// until the returned task is aborted.
	///
	/// The first refresh happens immediately.
	pub fn spawn_index_refresh(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(self.refresh_period);
			loop {
				interval.tick().await;
				if let Err(e) = self.refresh_name_index().await {
					log::warn!("Failed to refresh registry name index, keeping the previous one: {}", e);
				}
			}
		})
	}
}

#[async_trait]
impl Registry for RegistryClient {
	async fn search(&self, query: &str) -> crate::Result<Vec<RegistryPackage>> {
		let url = self.endpoint(&["rpc", "v5", "search", query])?;
		match self.rpc(self.client.get(url).query(&[("by", "name")])).await {
			Err(Error::QueryTooBroad) => {
				let index = self.index.snapshot();
				if index.is_empty() {
					return Err(Error::QueryTooBroad)
				}
				log::debug!("Search for `{}` is too broad for the registry, using the name index", query);
				let mut names = index.iter().filter(|n| n.contains(query)).cloned().collect::<Vec<_>>();
				names.sort();
				self.bulk_info(&names).await
			},
			r => r,
		}
	}

	async fn bulk_info(&self, names: &[String]) -> crate::Result<Vec<RegistryPackage>> {
		let url = self.endpoint(&["rpc", "v5", "info"])?;
		let mut packages = Vec::with_capacity(names.len());
		for chunk in names.chunks(self.chunk_size) {
			let args = chunk.iter().map(|n| ("arg[]", n.as_str())).collect::<Vec<_>>();
			packages.extend(self.rpc(self.client.get(url.clone()).query(&args)).await?);
		}
		Ok(packages)
	}

	async fn source_info(&self, package_base: &str) -> crate::Result<SourceInfo> {
		let url = self.endpoint(&["cgit", "aur.git", "plain", ".SRCINFO"])?;
		let text = self.client.get(url)
			.query(&[("h", package_base)])
			.send().await?
			.error_for_status()?
			.text().await?;
		SourceInfo::parse(&text)
	}

	fn local_name_index(&self) -> Arc<HashSet<String>> {
		self.index.snapshot()
	}
}
