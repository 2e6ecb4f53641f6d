//! Term URI minting.
//!
//! Every attribute and class gets an absolute URI derived from its local name
//! and the schema context it was found in:
//!
//! 1. a local name that already is an absolute URI is used verbatim;
//! 2. otherwise an explicit base URI (if non-blank) is the namespace;
//! 3. otherwise the namespace derived from the schema identifier
//!    (`<schema_namespace_base><schema-uuid>/`);
//! 4. otherwise the default term namespace.
//!
//! Minting is a pure function of its inputs: the same local name in the same
//! context always produces the same URI.

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

pub const HASH: char = '#';
pub const SLASH: char = '/';
pub const AT: char = '@';

pub const DEFAULT_SCHEMA_NAMESPACE_BASE: &str = "http://data.slub-dresden.de/schemas/";
pub const DEFAULT_TERM_NAMESPACE: &str = "http://data.slub-dresden.de/terms/";

/// Namespaces used when the caller supplies no explicit base URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriMinter {
    /// Prefix of schema-derived namespaces.
    pub schema_namespace_base: String,
    /// Namespace for terms minted without schema identity or base URI.
    pub default_namespace: String,
}

impl Default for UriMinter {
    fn default() -> Self {
        Self {
            schema_namespace_base: DEFAULT_SCHEMA_NAMESPACE_BASE.to_string(),
            default_namespace: DEFAULT_TERM_NAMESPACE.to_string(),
        }
    }
}

impl UriMinter {
    /// Namespace owned by one schema: `<base><schema-uuid>/`.
    pub fn schema_namespace(&self, schema_uuid: &str) -> String {
        format!("{}{}{}", self.schema_namespace_base, schema_uuid, SLASH)
    }

    /// The namespace a schema mints its terms in: its base URI if set and
    /// non-blank, else its schema namespace.
    pub fn schema_base(&self, schema_uuid: &str, base_uri: Option<&str>) -> String {
        match non_blank(base_uri) {
            Some(base) => base.to_string(),
            None => self.schema_namespace(schema_uuid),
        }
    }

    /// Mint a term URI inside a schema's namespace.
    pub fn mint_schema_term_uri(
        &self,
        local_name: &str,
        schema_uuid: &str,
        base_uri: Option<&str>,
    ) -> String {
        let namespace = self.schema_base(schema_uuid, base_uri);
        self.mint_term_uri(local_name, Some(&namespace))
    }

    /// Mint a term URI in `base_uri`, falling back to the default namespace.
    pub fn mint_term_uri(&self, local_name: &str, base_uri: Option<&str>) -> String {
        let stripped = local_name.trim_start_matches(AT);
        if is_valid_uri(stripped) {
            return stripped.to_string();
        }

        match non_blank(base_uri) {
            Some(namespace) => mint_uri(namespace, local_name),
            None => mint_uri(&self.default_namespace, local_name),
        }
    }

    /// Attribute URI for a local name found while walking a schema tree.
    ///
    /// A known schema identity wins (its namespace, or the base URI if one is
    /// given); without one the base URI is used; without both the default
    /// namespace.
    pub fn mint_attribute_uri(
        &self,
        local_name: &str,
        schema_uuid: Option<&str>,
        base_uri: Option<&str>,
    ) -> String {
        match schema_uuid {
            Some(uuid) => self.mint_schema_term_uri(local_name, uuid, base_uri),
            None => self.mint_term_uri(local_name, base_uri),
        }
    }
}

/// Concatenate a namespace and a local name.
///
/// - `…/` namespaces: leading `#`/`@` of the local name are dropped;
/// - local names starting with `#` are appended verbatim;
/// - `…#` namespaces: appended directly;
/// - anything else gets a `#` separator.
///
/// Local names are form-urlencoded (space becomes `+`).
pub fn mint_uri(namespace: &str, local_name: &str) -> String {
    let local_name = local_name.trim_start_matches(AT);

    if namespace.ends_with(SLASH) {
        let local = local_name.trim_start_matches(HASH);
        return format!("{namespace}{}", escape_local_name(local));
    }

    if local_name.starts_with(HASH) {
        return format!("{namespace}{local_name}");
    }

    let escaped = escape_local_name(local_name);
    if namespace.ends_with(HASH) {
        format!("{namespace}{escaped}")
    } else {
        format!("{namespace}{HASH}{escaped}")
    }
}

/// An identifier counts as a URI when it parses with a scheme.
pub fn is_valid_uri(identifier: &str) -> bool {
    if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
        return false;
    }
    Url::parse(identifier).is_ok()
}

/// The part after the last `#` (or, failing that, the last `/`).
pub fn relative_uri_part(uri: &str) -> &str {
    let delimiter = match (uri.rfind(HASH), uri.rfind(SLASH)) {
        (Some(idx), _) if idx > 0 => idx,
        (_, Some(idx)) if idx > 0 => idx,
        _ => return uri,
    };
    &uri[delimiter + 1..]
}

fn escape_local_name(local_name: &str) -> String {
    form_urlencoded::byte_serialize(local_name.as_bytes()).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slash_namespaces_concatenate() {
        assert_eq!(mint_uri("http://x.org/ns/", "title"), "http://x.org/ns/title");
        assert_eq!(mint_uri("http://x.org/ns/", "#title"), "http://x.org/ns/title");
        assert_eq!(mint_uri("http://x.org/ns/", "@lang"), "http://x.org/ns/lang");
    }

    #[test]
    fn hash_namespaces_and_separator() {
        assert_eq!(mint_uri("http://x.org/ns#", "title"), "http://x.org/ns#title");
        assert_eq!(mint_uri("http://x.org/ns", "title"), "http://x.org/ns#title");
        assert_eq!(mint_uri("http://x.org/ns", "#frag"), "http://x.org/ns#frag");
    }

    #[test]
    fn local_names_are_form_encoded() {
        assert_eq!(
            mint_uri("http://x.org/ns/", "main title"),
            "http://x.org/ns/main+title"
        );
        assert_eq!(mint_uri("http://x.org/ns/", "a/b"), "http://x.org/ns/a%2Fb");
        assert_eq!(
            mint_uri("http://x.org/ns/", "finc.record_id"),
            "http://x.org/ns/finc.record_id"
        );
    }

    #[test]
    fn absolute_local_names_are_kept() {
        let minter = UriMinter::default();
        assert_eq!(
            minter.mint_term_uri("http://purl.org/dc/terms/title", Some("http://x.org/")),
            "http://purl.org/dc/terms/title"
        );
        assert_eq!(
            minter.mint_term_uri("@http://purl.org/dc/terms/title", None),
            "http://purl.org/dc/terms/title"
        );
    }

    #[test]
    fn schema_identity_and_base_uri_precedence() {
        let minter = UriMinter::default();
        assert_eq!(
            minter.mint_attribute_uri("title", Some("Schema-1"), None),
            "http://data.slub-dresden.de/schemas/Schema-1/title"
        );
        assert_eq!(
            minter.mint_attribute_uri("title", Some("Schema-1"), Some("http://base.org/")),
            "http://base.org/title"
        );
        assert_eq!(
            minter.mint_attribute_uri("title", Some("Schema-1"), Some("   ")),
            "http://data.slub-dresden.de/schemas/Schema-1/title"
        );
        assert_eq!(
            minter.mint_attribute_uri("title", None, Some("http://base.org/")),
            "http://base.org/title"
        );
        assert_eq!(
            minter.mint_attribute_uri("title", None, None),
            "http://data.slub-dresden.de/terms/title"
        );
    }

    #[test]
    fn relative_part() {
        assert_eq!(relative_uri_part("http://x.org/ns#title"), "title");
        assert_eq!(relative_uri_part("http://x.org/ns/title"), "title");
        assert_eq!(relative_uri_part("title"), "title");
        assert_eq!(relative_uri_part(RDF_TYPE_FOR_TEST), "type");
    }

    const RDF_TYPE_FOR_TEST: &str = crate::RDF_TYPE;

    proptest! {
        #[test]
        fn minting_is_deterministic(local in "[A-Za-z_][A-Za-z0-9_ .-]{0,12}", uuid in "[a-f0-9]{8}") {
            let minter = UriMinter::default();
            let a = minter.mint_attribute_uri(&local, Some(&uuid), None);
            let b = minter.mint_attribute_uri(&local, Some(&uuid), None);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.starts_with(&minter.schema_namespace(&uuid)));
        }
    }
}
