//! Per-resource JSP configuration derived from JSP property groups.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum ServletVersion {
    #[serde(rename = "2.3")]
    V2_3,
    #[serde(rename = "2.4")]
    V2_4,
    #[serde(rename = "2.5")]
    V2_5,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    #[default]
    V3_1,
    #[serde(rename = "4.0")]
    V4_0,
}

impl ServletVersion {
    /// Servlet 2.5 made a configured/declared page-encoding mismatch fatal.
    /// Older modules only see the configured value win.
    pub fn rejects_encoding_mismatch(self) -> bool {
        self >= ServletVersion::V2_5
    }
}

/// Configuration governing one translation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JspConfiguration {
    /// Explicit `page-encoding`. Filled in from the page directive when the
    /// configuration leaves it unset.
    pub page_encoding: Option<String>,
    /// `Some` when a property group sets `is-xml`.
    pub is_xml: Option<bool>,
    pub preludes: Vec<String>,
    pub codas: Vec<String>,
    pub servlet_version: ServletVersion,
}

impl JspConfiguration {
    pub fn is_xml_specified(&self) -> bool {
        self.is_xml.is_some()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyGroup {
    pub url_patterns: Vec<String>,
    pub page_encoding: Option<String>,
    pub is_xml: Option<bool>,
    pub include_preludes: Vec<String>,
    pub include_codas: Vec<String>,
}

impl PropertyGroup {
    pub fn matches(&self, path: &str) -> bool {
        self.url_patterns
            .iter()
            .any(|pattern| url_pattern_matches(pattern, path))
    }
}

/// Servlet-style URL pattern match: exact, `/prefix/*`, or `*.ext`.
pub fn url_pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(ext) = pattern.strip_prefix("*.") {
        return path
            .rsplit_once('.')
            .is_some_and(|(stem, path_ext)| path_ext == ext && !stem.ends_with('/'));
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
    }
    pattern == path
}

/// Property groups of one web module.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JspConfigManager {
    pub servlet_version: ServletVersion,
    pub property_groups: Vec<PropertyGroup>,
}

impl JspConfigManager {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Configuration for a top-level translation of `path`.
    ///
    /// Preludes and codas accumulate over every matching group in order; the
    /// last matching group that sets `page_encoding` or `is_xml` decides it.
    pub fn configuration_for(&self, path: &str) -> JspConfiguration {
        let mut config = JspConfiguration {
            servlet_version: self.servlet_version,
            ..JspConfiguration::default()
        };
        for group in self.property_groups.iter().filter(|g| g.matches(path)) {
            if group.page_encoding.is_some() {
                config.page_encoding = group.page_encoding.clone();
            }
            if group.is_xml.is_some() {
                config.is_xml = group.is_xml;
            }
            config.preludes.extend(group.include_preludes.iter().cloned());
            config.codas.extend(group.include_codas.iter().cloned());
        }
        config
    }

    /// Configuration for a static include of `path`. Preludes and codas
    /// belong to the including page and are not repeated.
    pub fn configuration_for_static_include(
        &self,
        path: &str,
        including: &JspConfiguration,
    ) -> JspConfiguration {
        let mut config = self.configuration_for(path);
        config.preludes.clear();
        config.codas.clear();
        config.servlet_version = including.servlet_version;
        config
    }
}
