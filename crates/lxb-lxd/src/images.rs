//! Publishing a container as an image.

use crate::client::LxdClient;
use crate::error::{LxdError, Result};
use crate::types::{ImageAliasPost, ImageSource, ImagesPost};
use hyper::Method;
use std::collections::BTreeMap;

impl LxdClient {
    /// Publish the (stopped) container `name` as an image and attach aliases.
    ///
    /// Returns the new image's fingerprint.
    pub async fn publish_image(
        &self,
        name: &str,
        public: bool,
        aliases: &[String],
        properties: &BTreeMap<String, String>,
        compression: Option<&str>,
    ) -> Result<String> {
        let start = std::time::Instant::now();
        tracing::info!(name = %name, public, aliases = aliases.len(), "Publishing image");

        let post = ImagesPost {
            public,
            properties: properties.clone(),
            compression_algorithm: compression.map(str::to_string),
            source: ImageSource {
                kind: "container".into(),
                name: name.to_string(),
            },
        };
        let op = self.call_async(Method::POST, "/1.0/images", &post).await?;
        let fingerprint = op
            .metadata_str("fingerprint")
            .map(str::to_string)
            .ok_or_else(|| LxdError::Protocol("image operation returned no fingerprint".into()))?;

        for alias in aliases {
            tracing::debug!(alias = %alias, fingerprint = %fingerprint, "Adding image alias");
            let post = ImageAliasPost {
                name: alias.clone(),
                description: String::new(),
                target: fingerprint.clone(),
            };
            self.send_json(Method::POST, "/1.0/images/aliases", &post)
                .await?;
        }

        tracing::info!(
            fingerprint = %fingerprint,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image published"
        );
        Ok(fingerprint)
    }
}
