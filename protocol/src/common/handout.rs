//! Handout-related data structures
//!
//! Subjects group handouts, handouts own an ordered list of versions. The
//! server owns all of these; clients only display and forward them.

use serde::{Deserialize, Serialize};

// ============================================================================
// Subject Structures
// ============================================================================

/// Subject bucket with the number of handouts filed under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    /// Subject name, also used as its identifier
    pub id: String,
    #[serde(default)]
    pub count: u64,
}

// ============================================================================
// Handout Structures
// ============================================================================

/// Handout representation for subject listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoutSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub latest_version: Option<u32>,
}

/// One uploaded revision of a handout
///
/// Accepts both the listing field names (`version`, `file_size`, `file_type`)
/// and the names used by the detail endpoints (`version_number`, `size`,
/// `content_type`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoutVersion {
    pub id: String,
    #[serde(alias = "version_number")]
    pub version: u32,
    #[serde(default, alias = "content_type")]
    pub file_type: Option<String>,
    #[serde(default, alias = "size")]
    pub file_size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub previews: u64,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
}
