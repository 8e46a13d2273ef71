//! Embedded HKP (HTTP Keyserver Protocol) actions: `pks/lookup` and
//! `pks/add`. The keyring itself is an out-of-scope external collaborator
//! (`KeyStore`); this module only owns the query-string/body decoding and
//! response shaping described in §4.12.

use crate::error::{Error, Result};
use crate::request_parser::url_decode;

/// External keyring backend. Not implemented here — the design calls this
/// out explicitly as a capability the core consumes, not owns.
pub trait KeyStore {
    fn lookup(&self, op: &str, search: &str, options: &[(String, String)]) -> Result<LookupResult>;
    fn add(&self, keytext: &str) -> Result<()>;
}

pub struct LookupResult {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Parses `pks/lookup`'s query string (`op=`, `search=`, everything else
/// is passed through as an option, e.g. `options=mr,nm`) and calls the
/// keystore.
pub fn lookup(store: &dyn KeyStore, query: &str) -> Result<LookupResult> {
    let mut op = None;
    let mut search = None;
    let mut options = Vec::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let k = url_decode(k)?;
        let v = url_decode(v)?;
        match k.as_str() {
            "op" => op = Some(v),
            "search" => search = Some(v),
            _ => options.push((k, v)),
        }
    }

    let op = op.ok_or_else(|| Error::Malformed("missing op".to_string()))?;
    let search = search.unwrap_or_default();
    store.lookup(&op, &search, &options)
}

/// Parses `pks/add`'s URL-encoded `keytext=...` body and calls the
/// keystore.
pub fn add(store: &dyn KeyStore, body: &[u8]) -> Result<()> {
    let body_str = std::str::from_utf8(body).map_err(|_| Error::Malformed("non-utf8 body".to_string()))?;
    for pair in body_str.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == "keytext" {
                let keytext = url_decode(v)?;
                return store.add(&keytext);
            }
        }
    }
    Err(Error::Malformed("missing keytext".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeStore {
        added: RefCell<Vec<String>>,
    }

    impl KeyStore for FakeStore {
        fn lookup(&self, op: &str, search: &str, _options: &[(String, String)]) -> Result<LookupResult> {
            if op == "get" && search == "0x1234" {
                Ok(LookupResult { content_type: "application/pgp-keys", body: b"KEYDATA".to_vec() })
            } else {
                Err(Error::NotFound("no such key".to_string()))
            }
        }
        fn add(&self, keytext: &str) -> Result<()> {
            self.added.borrow_mut().push(keytext.to_string());
            Ok(())
        }
    }

    #[test]
    fn lookup_decodes_op_and_search() {
        let store = FakeStore { added: RefCell::new(Vec::new()) };
        let result = lookup(&store, "op=get&search=0x1234").unwrap();
        assert_eq!(result.body, b"KEYDATA");
    }

    #[test]
    fn lookup_without_op_is_malformed() {
        let store = FakeStore { added: RefCell::new(Vec::new()) };
        assert!(lookup(&store, "search=x").is_err());
    }

    #[test]
    fn add_decodes_keytext_from_body() {
        let store = FakeStore { added: RefCell::new(Vec::new()) };
        add(&store, b"keytext=abc%20def").unwrap();
        assert_eq!(store.added.borrow()[0], "abc def");
    }

    #[test]
    fn add_without_keytext_is_malformed() {
        let store = FakeStore { added: RefCell::new(Vec::new()) };
        assert!(add(&store, b"other=1").is_err());
    }
}
