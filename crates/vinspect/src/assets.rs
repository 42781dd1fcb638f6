//! Asset staging: turn evidence item URIs into attachments the vision API
//! accepts.
//!
//! Local files are inlined as base64 data URLs; http(s) URLs pass through
//! untouched. Resolution runs in small concurrent batches with a short
//! pause between them, keeping the fan-out polite to the storage backend.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use futures_util::future::try_join_all;
use log::debug;
use thiserror::Error;

use crate::analysis::ImageAttachment;
use crate::config::AssetsConfig;
use crate::evidence::EvidenceItem;

const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to read asset '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported asset URI scheme: {0}")]
    UnsupportedScheme(String),
}

/// Resolves every item's asset to an [`ImageAttachment`], preserving item
/// order.
pub async fn prepare_attachments(
    items: &[EvidenceItem],
    config: &AssetsConfig,
) -> Result<Vec<ImageAttachment>, AssetError> {
    let mut attachments = Vec::with_capacity(items.len());
    let batch_size = config.max_concurrent.max(1);
    let mut batches = items.chunks(batch_size).peekable();

    while let Some(batch) = batches.next() {
        let resolved = try_join_all(batch.iter().map(resolve_one)).await?;
        attachments.extend(resolved);

        if batches.peek().is_some() && config.batch_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.batch_pause_ms)).await;
        }
    }

    debug!("Staged {} asset(s)", attachments.len());
    Ok(attachments)
}

async fn resolve_one(item: &EvidenceItem) -> Result<ImageAttachment, AssetError> {
    let media_type = item
        .media_type()
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());
    let uri = item.asset_uri.as_str();

    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(ImageAttachment {
            media_type,
            url: uri.to_string(),
        });
    }

    let path = match uri.strip_prefix("file://") {
        Some(rest) => PathBuf::from(rest),
        None if uri.starts_with('/') => PathBuf::from(uri),
        None => {
            let scheme = uri.split(':').next().unwrap_or(uri);
            return Err(AssetError::UnsupportedScheme(scheme.to_string()));
        }
    };

    let bytes = tokio::fs::read(&path).await.map_err(|e| AssetError::Read {
        path: path.clone(),
        source: e,
    })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(ImageAttachment {
        media_type: media_type.clone(),
        url: format!("data:{};base64,{}", media_type, encoded),
    })
}
