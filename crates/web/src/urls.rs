//! URL normalizer.
//!
//! On the shared CGI host the application is reached through a front
//! controller (`index.cgi`) under a sub-directory, so URLs built from the
//! request's script name look like `/index.cgi/register_name` and lack the
//! public `BASE_PATH`. Every generated URL and redirect target passes
//! through [`UrlNormalizer::normalize`], which removes the front-controller
//! segment and, outside Docker, prefixes `BASE_PATH`.

use roster_core::DeploymentMode;

/// Front-controller segment removed from every URL.
const FRONT_CONTROLLER: &str = "/index.cgi";

/// Named application routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Test,
    RegisterName,
    DeleteAllUsers,
    SendEmail,
    Health,
    Ready,
}

impl Route {
    /// Path as mounted on the router.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Index => "/",
            Self::Test => "/test",
            Self::RegisterName => "/register_name",
            Self::DeleteAllUsers => "/delete_all_users",
            Self::SendEmail => "/send_email",
            Self::Health => "/health",
            Self::Ready => "/health/ready",
        }
    }
}

/// Rewrites application URLs for the current deployment.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    deployment: DeploymentMode,
    base_path: String,
    script_name: String,
}

impl UrlNormalizer {
    /// `base_path` must already be normalized (leading `/`, no trailing `/`,
    /// empty for the root).
    #[must_use]
    pub fn new(
        deployment: DeploymentMode,
        base_path: impl Into<String>,
        script_name: impl Into<String>,
    ) -> Self {
        Self {
            deployment,
            base_path: base_path.into(),
            script_name: script_name.into(),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Normalize `url`. Pure and idempotent.
    #[must_use]
    pub fn normalize(&self, url: &str) -> String {
        let stripped = strip_front_controller(url);

        if self.deployment.is_containerized() || self.base_path.is_empty() {
            return stripped;
        }
        if !is_root_relative(&stripped) || has_prefix(&stripped, &self.base_path) {
            return stripped;
        }

        format!("{}{stripped}", self.base_path)
    }

    /// URL for a named route, as a browser should request it.
    #[must_use]
    pub fn url_for(&self, route: Route) -> String {
        self.normalize(&format!("{}{}", self.script_name, route.path()))
    }

    /// URL for a file under `/static`.
    #[must_use]
    pub fn static_url(&self, file: &str) -> String {
        self.normalize(&format!(
            "{}/static/{}",
            self.script_name,
            file.trim_start_matches('/')
        ))
    }
}

/// Remove every `/index.cgi` path segment, repeating until none remain.
fn strip_front_controller(url: &str) -> String {
    let mut out = url.to_string();

    while let Some(pos) = find_segment(&out) {
        out.replace_range(pos..pos + FRONT_CONTROLLER.len(), "");
    }

    // Stripping `/index.cgi` or `/index.cgi?x` leaves no path at all.
    if out.is_empty() || out.starts_with(['?', '#']) {
        out.insert(0, '/');
    }
    out
}

/// Byte offset of the first `/index.cgi` that ends a path segment.
fn find_segment(url: &str) -> Option<usize> {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url.get(..path_end).unwrap_or(url);

    path.match_indices(FRONT_CONTROLLER)
        .map(|(pos, _)| pos)
        .find(|&pos| {
            path.get(pos + FRONT_CONTROLLER.len()..)
                .and_then(|rest| rest.chars().next())
                .is_none_or(|c| c == '/')
        })
}

fn is_root_relative(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//")
}

/// `url` already starts with `base` as a whole path segment.
fn has_prefix(url: &str, base: &str) -> bool {
    url.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn lolipop(base: &str) -> UrlNormalizer {
        UrlNormalizer::new(DeploymentMode::LolipopTest, base, "")
    }

    #[test]
    fn test_lolipop_prefixes_base_path() {
        assert_eq!(lolipop("/sub").normalize("/test"), "/sub/test");
        assert_eq!(lolipop("/sub").normalize("/"), "/sub/");
    }

    #[test]
    fn test_docker_leaves_paths_alone() {
        let normalizer = UrlNormalizer::new(DeploymentMode::Docker, "/sub", "");
        assert_eq!(normalizer.normalize("/test"), "/test");
    }

    #[test]
    fn test_existing_prefix_is_not_doubled() {
        let normalizer = lolipop("/sub");
        assert_eq!(normalizer.normalize("/sub/test"), "/sub/test");
        assert_eq!(normalizer.normalize("/sub"), "/sub");
        assert_eq!(normalizer.normalize("/sub?x=1"), "/sub?x=1");
        // Shares characters but not the segment.
        assert_eq!(normalizer.normalize("/subway"), "/sub/subway");
    }

    #[test]
    fn test_front_controller_is_stripped() {
        let normalizer = lolipop("/sub");
        assert_eq!(normalizer.normalize("/index.cgi/test"), "/sub/test");
        assert_eq!(normalizer.normalize("/sub/index.cgi/test"), "/sub/test");
        assert_eq!(normalizer.normalize("/index.cgi"), "/sub/");
        assert_eq!(normalizer.normalize("/index.cgi?page=2"), "/sub/?page=2");
        assert_eq!(
            normalizer.normalize("/index.cgi/index.cgi/test"),
            "/sub/test"
        );
    }

    #[test]
    fn test_front_controller_lookalikes_are_kept() {
        let normalizer = lolipop("");
        assert_eq!(normalizer.normalize("/index.cgiX/a"), "/index.cgiX/a");
        assert_eq!(normalizer.normalize("/a?next=/index.cgi"), "/a?next=/index.cgi");
    }

    #[test]
    fn test_absolute_urls_are_not_prefixed() {
        let normalizer = lolipop("/sub");
        assert_eq!(
            normalizer.normalize("https://example.com/index.cgi/test"),
            "https://example.com/test"
        );
        assert_eq!(normalizer.normalize("//cdn.example.com/x"), "//cdn.example.com/x");
    }

    #[test]
    fn test_url_for_uses_script_name() {
        let normalizer = UrlNormalizer::new(DeploymentMode::LolipopProd, "/sub", "/index.cgi");
        assert_eq!(normalizer.url_for(Route::RegisterName), "/sub/register_name");
        assert_eq!(normalizer.url_for(Route::Index), "/sub/");
        assert_eq!(normalizer.static_url("style.css"), "/sub/static/style.css");

        let docker = UrlNormalizer::new(DeploymentMode::Docker, "", "");
        assert_eq!(docker.url_for(Route::Test), "/test");
    }

    fn any_mode() -> impl Strategy<Value = DeploymentMode> {
        prop::sample::select(DeploymentMode::ALL.to_vec())
    }

    fn any_url() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("/index.cgi".to_string()),
                Just("/sub".to_string()),
                Just("/".to_string()),
                Just("?q=/index.cgi".to_string()),
                Just("#top".to_string()),
                "/[a-z.]{0,10}",
            ],
            0..6,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            mode in any_mode(),
            base in prop::sample::select(vec!["", "/sub", "/a/b"]),
            url in any_url(),
        ) {
            let normalizer = UrlNormalizer::new(mode, base, "");
            let once = normalizer.normalize(&url);
            prop_assert_eq!(normalizer.normalize(&once), once);
        }

        #[test]
        fn prop_output_has_no_front_controller_segment(
            mode in any_mode(),
            url in any_url(),
        ) {
            let out = UrlNormalizer::new(mode, "/sub", "").normalize(&url);
            prop_assert!(find_segment(&out).is_none());
        }
    }
}
