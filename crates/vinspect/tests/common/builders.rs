//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use vinspect::evidence::{EvidenceItem, ItemCategory};

pub const MB: u64 = 1024 * 1024;

/// Builder for evidence items with sensible photo defaults.
pub struct ItemBuilder {
    category: ItemCategory,
    byte_size: u64,
    asset_uri: String,
    obd_code: Option<String>,
    obd_description: Option<String>,
}

impl ItemBuilder {
    pub fn new(category: ItemCategory) -> Self {
        Self {
            category,
            byte_size: MB,
            // Remote URIs keep asset staging off the filesystem.
            asset_uri: "https://assets.example.com/photo.jpg".to_string(),
            obd_code: None,
            obd_description: None,
        }
    }

    pub fn megabytes(mut self, mb: u64) -> Self {
        self.byte_size = mb * MB;
        self
    }

    pub fn bytes(mut self, bytes: u64) -> Self {
        self.byte_size = bytes;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.asset_uri = uri.to_string();
        self
    }

    pub fn obd(mut self, code: &str, description: &str) -> Self {
        self.category = ItemCategory::Obd;
        self.obd_code = Some(code.to_string());
        self.obd_description = Some(description.to_string());
        self
    }

    pub fn build(self) -> EvidenceItem {
        let mut item = EvidenceItem::new(self.category, self.byte_size, self.asset_uri);
        item.obd_code = self.obd_code;
        item.obd_description = self.obd_description;
        item
    }
}
