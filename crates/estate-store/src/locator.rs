use estate_types::Locator;

use crate::address::AssetPath;

/// Maps asset paths to public locators and back.
///
/// Locators take the form `<public_base_url>/<bucket>/<path>` with each path
/// segment percent-encoded. Resolution also accepts `gs://<bucket>/<path>`
/// and any `scheme://host/<bucket>/<path>` URL whose bucket matches, ignoring
/// query strings and fragments. Anything else does not resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatorCodec {
    public_base_url: String,
    bucket: String,
}

impl LocatorCodec {
    pub fn new(public_base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_owned();
        Self {
            public_base_url,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Public locator for a stored path.
    pub fn locator(&self, path: &AssetPath) -> Locator {
        let encoded: Vec<String> = path
            .as_str()
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();
        Locator::new(format!(
            "{}/{}/{}",
            self.public_base_url,
            self.bucket,
            encoded.join("/")
        ))
    }

    /// Recover the storage path behind a locator.
    ///
    /// Returns `None` for blank, foreign (other bucket) or malformed
    /// locators, and for any path that would escape the bucket root.
    pub fn resolve(&self, locator: &Locator) -> Option<AssetPath> {
        if locator.is_blank() {
            return None;
        }
        let raw = locator.as_str().trim();
        let decoded = urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_owned());
        let decoded = decoded
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_owned();

        let in_bucket = if let Some(rest) = strip_base(&decoded, &self.public_base_url) {
            self.strip_bucket(rest)?
        } else if let Some(rest) = decoded.strip_prefix("gs://") {
            self.strip_bucket(rest)?
        } else if let Some((_, rest)) = decoded.split_once("://") {
            let (_host, rest) = rest.split_once('/')?;
            self.strip_bucket(rest)?
        } else {
            decoded.trim_start_matches('/')
        };

        let path = AssetPath::new(in_bucket);
        path.is_contained().then_some(path)
    }

    fn strip_bucket<'a>(&self, rest: &'a str) -> Option<&'a str> {
        let (bucket, path) = rest.split_once('/')?;
        (bucket == self.bucket).then_some(path)
    }
}

fn strip_base<'a>(locator: &'a str, base: &str) -> Option<&'a str> {
    locator.strip_prefix(base)?.strip_prefix('/')
}

impl Default for LocatorCodec {
    fn default() -> Self {
        Self::new("https://storage.googleapis.com", "estate-assets")
    }
}
