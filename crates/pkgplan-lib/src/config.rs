//! Options controlling how a transaction is planned.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PlannerOptions {
	automatch_providers: bool,
	prefer_repository_provider: bool,
	check_dependency_breakage: bool,
	registry_url: String,
	https_only: bool,
	registry_concurrency: usize,
	registry_chunk_size: usize,
	use_source_info: bool,
	architecture: String,
	name_index_refresh: Duration,
	request_timeout: Duration,
}

impl Default for PlannerOptions {
	fn default() -> Self {
		Self {
			automatch_providers: false,
			prefer_repository_provider: true,
			check_dependency_breakage: true,
			registry_url: "https://aur.archlinux.org".to_string(),
			https_only: true,
			registry_concurrency: 8,
			registry_chunk_size: 150,
			use_source_info: true,
			architecture: {
				#[cfg(target_arch = "aarch64")]
				let arch = "aarch64";
				#[cfg(not(target_arch = "aarch64"))]
				let arch = "x86_64";
				arch.to_string()
			},
			name_index_refresh: Duration::from_secs(60 * 60),
			request_timeout: Duration::from_secs(30),
		}
	}
}

impl PlannerOptions {
	/// When several packages provide a dependency, pick the one named exactly like it instead of asking.
	pub fn automatch_providers(&self) -> bool {
		self.automatch_providers
	}
	pub fn set_automatch_providers(&mut self, automatch_providers: bool) {
		self.automatch_providers = automatch_providers;
	}

	/// Ignore registry candidates for a dependency the repositories can already provide.
	pub fn prefer_repository_provider(&self) -> bool {
		self.prefer_repository_provider
	}
	pub fn set_prefer_repository_provider(&mut self, prefer_repository_provider: bool) {
		self.prefer_repository_provider = prefer_repository_provider;
	}

	/// Withdraw upgrades whose new version no longer satisfies an installed dependent.
	pub fn check_dependency_breakage(&self) -> bool {
		self.check_dependency_breakage
	}
	pub fn set_check_dependency_breakage(&mut self, check_dependency_breakage: bool) {
		self.check_dependency_breakage = check_dependency_breakage;
	}

	pub fn registry_url(&self) -> &str {
		&self.registry_url
	}
	pub fn set_registry_url(&mut self, registry_url: impl Into<String>) {
		self.registry_url = registry_url.into().trim_end_matches('/').to_string();
	}

	pub fn https_only(&self) -> bool {
		self.https_only
	}
	pub fn set_https_only(&mut self, https_only: bool) {
		self.https_only = https_only;
	}

	/// Maximum number of registry requests in flight at once.
	pub fn registry_concurrency(&self) -> usize {
		self.registry_concurrency
	}
	/// Values below 1 are clamped to 1.
	pub fn set_registry_concurrency(&mut self, registry_concurrency: usize) {
		self.registry_concurrency = registry_concurrency.max(1);
	}

	/// Number of names sent in a single bulk info request.
	pub fn registry_chunk_size(&self) -> usize {
		self.registry_chunk_size
	}
	pub fn set_registry_chunk_size(&mut self, registry_chunk_size: usize) {
		self.registry_chunk_size = registry_chunk_size.max(1);
	}

	pub fn use_source_info(&self) -> bool {
		self.use_source_info
	}
	pub fn set_use_source_info(&mut self, use_source_info: bool) {
		self.use_source_info = use_source_info;
	}

	/// Used to pick architecture specific fields out of build recipes.
	pub fn architecture(&self) -> &str {
		&self.architecture
	}
	pub fn set_architecture(&mut self, architecture: impl Into<String>) {
		self.architecture = architecture.into();
	}

	pub fn name_index_refresh(&self) -> Duration {
		self.name_index_refresh
	}
	pub fn set_name_index_refresh(&mut self, name_index_refresh: Duration) {
		self.name_index_refresh = name_index_refresh;
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}
	pub fn set_request_timeout(&mut self, request_timeout: Duration) {
		self.request_timeout = request_timeout;
	}
}
