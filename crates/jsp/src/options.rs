use serde::Deserialize;
use std::collections::BTreeMap;

/// Translator behavior flags, normally supplied as web-module JSP attributes.
///
/// Every flag defaults to the strict behavior except `use_implicit_tag_libs`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JspOptions {
    /// A taglib directive may rebind a prefix to a different URI.
    pub allow_taglib_prefix_redefinition: bool,
    /// A taglib directive may declare a prefix already seen on a tag.
    pub allow_taglib_prefix_use_before_definition: bool,
    /// A mismatched custom-tag end tag is emitted as template text.
    pub allow_unmatched_end_tag: bool,
    /// Repeated action attributes accumulate instead of failing.
    pub allow_multiple_attribute_values: bool,
    pub use_implicit_tag_libs: bool,
    /// Static includes may target a directory. When false such includes
    /// are skipped.
    pub allow_directory_include: bool,
    /// Keep the first backslash of `\\` unless a quote follows it.
    pub eval_expression_following_two_backslashes: bool,
    /// Prefix to URI map seeded into every translation unit when
    /// `use_implicit_tag_libs` is set.
    pub implicit_tag_libs: BTreeMap<String, String>,
}

impl Default for JspOptions {
    fn default() -> Self {
        Self {
            allow_taglib_prefix_redefinition: false,
            allow_taglib_prefix_use_before_definition: false,
            allow_unmatched_end_tag: false,
            allow_multiple_attribute_values: false,
            use_implicit_tag_libs: true,
            allow_directory_include: false,
            eval_expression_following_two_backslashes: false,
            implicit_tag_libs: default_implicit_tag_libs(),
        }
    }
}

fn default_implicit_tag_libs() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("jsx".to_string(), "http://websphere.ibm.com/tags/jsx".to_string()),
        ("tsx".to_string(), "http://websphere.ibm.com/tags/tsx".to_string()),
    ])
}

impl JspOptions {
    /// Build options from `name=value` properties. Unknown names are ignored;
    /// values that are not `true`/`false` keep the default.
    pub fn from_properties<'a, I>(properties: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (name, value) in properties {
            let slot = match name {
                "allowTaglibPrefixRedefinition" => &mut options.allow_taglib_prefix_redefinition,
                "allowTaglibPrefixUseBeforeDefinition" => {
                    &mut options.allow_taglib_prefix_use_before_definition
                }
                "allowUnmatchedEndTag" => &mut options.allow_unmatched_end_tag,
                "allowMultipleAttributeValues" => &mut options.allow_multiple_attribute_values,
                "useImplicitTagLibs" => &mut options.use_implicit_tag_libs,
                "allowDirectoryInclude" => &mut options.allow_directory_include,
                "evalExpressionFollowingTwoBackslashes" => {
                    &mut options.eval_expression_following_two_backslashes
                }
                _ => continue,
            };
            match parse_bool(value) {
                Some(flag) => *slot = flag,
                None => log::info!(target: "jsp.options", "Invalid value for {name}: {value:?}"),
            }
        }
        options
    }

    /// Tag prefixes every translation unit starts with.
    pub fn implicit_tag_prefixes(&self) -> BTreeMap<String, String> {
        if self.use_implicit_tag_libs {
            self.implicit_tag_libs.clone()
        } else {
            BTreeMap::new()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
