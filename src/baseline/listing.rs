//! Listing and downloading footfall extracts from the public crowding bucket.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use roxmltree::Document;
use tracing::info;

use crate::fetch::{HttpClient, fetch_bytes, fetch_text};

pub const DEFAULT_LISTING_BASE_URL: &str =
    "https://s3-eu-west-1.amazonaws.com/crowding.data.tfl.gov.uk/";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://crowding.data.tfl.gov.uk/";
pub const DEFAULT_KEY_PREFIX: &str = "Network Demand/";
pub const DEFAULT_FILENAME_PREFIX: &str = "StationFootfall";
pub const DOWNLOAD_DELAY: Duration = Duration::from_millis(100);

/// Where footfall extracts are published.
#[derive(Debug, Clone)]
pub struct FootfallSource {
    pub listing_base_url: String,
    pub download_base_url: String,
    pub key_prefix: String,
    pub filename_prefix: String,
}

impl Default for FootfallSource {
    fn default() -> Self {
        Self {
            listing_base_url: DEFAULT_LISTING_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
        }
    }
}

impl FootfallSource {
    pub fn listing_url(&self) -> String {
        format!(
            "{}?list-type=2&max-keys=1000&prefix={}",
            self.listing_base_url,
            urlencoding::encode(&self.key_prefix)
        )
    }

    pub fn download_url(&self, key: &str) -> String {
        let base = self.download_base_url.trim_end_matches('/');
        let path: Vec<_> = key.split('/').map(urlencoding::encode).collect();
        format!("{base}/{}", path.join("/"))
    }

    /// Keys whose file name is a footfall CSV, paired with that file name.
    pub fn select_candidates<'a>(&self, keys: &'a [String]) -> Vec<(&'a str, &'a str)> {
        keys.iter()
            .map(|key| (key.as_str(), file_name(key)))
            .filter(|(_, name)| name.starts_with(&self.filename_prefix) && name.ends_with(".csv"))
            .collect()
    }
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Extracts object keys from a `ListObjectsV2` XML document, skipping folder
/// markers and the bucket's `index.html`.
pub fn parse_listing(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml).context("object listing is not valid XML")?;

    let keys = doc
        .descendants()
        .filter(|n| n.has_tag_name("Contents"))
        .filter_map(|contents| {
            contents
                .children()
                .find(|n| n.has_tag_name("Key"))
                .and_then(|k| k.text())
        })
        .filter(|key| !key.ends_with('/') && *key != "index.html")
        .map(str::to_string)
        .collect();

    Ok(keys)
}

/// Lists every object key under the source's prefix.
pub async fn list_keys<C: HttpClient>(client: &C, source: &FootfallSource) -> Result<Vec<String>> {
    let url = source.listing_url();
    info!(url = %url, "Listing footfall extracts");
    let xml = fetch_text(client, &url).await?;
    parse_listing(&xml)
}

/// Brings `folder` up to date with the published extracts and returns the
/// number of files downloaded.
///
/// The alphabetically last local file is removed first: it is the rolling
/// extract for the current year, which is republished (and eventually split
/// in two) upstream. Every other candidate already present is left alone.
#[tracing::instrument(skip_all, fields(folder = %folder.display()))]
pub async fn sync_footfall_files<C: HttpClient>(
    client: &C,
    source: &FootfallSource,
    folder: &Path,
) -> Result<usize> {
    fs::create_dir_all(folder)
        .with_context(|| format!("cannot create download folder {}", folder.display()))?;

    let local = remove_latest_local(folder)?;
    let keys = list_keys(client, source).await?;

    let mut downloaded = 0;
    for (key, name) in source.select_candidates(&keys) {
        if local.contains(name) {
            continue;
        }
        let target = folder.join(name);
        let url = source.download_url(key);
        let bytes = fetch_bytes(client, &url)
            .await
            .with_context(|| format!("download of {url} failed"))?;
        fs::write(&target, bytes).with_context(|| format!("cannot write {}", target.display()))?;
        info!(file = %target.display(), "Footfall extract downloaded");
        downloaded += 1;

        tokio::time::sleep(DOWNLOAD_DELAY).await;
    }

    info!(downloaded, "Footfall sync complete");
    Ok(downloaded)
}

/// Deletes the last local file by name and returns the names that remain.
fn remove_latest_local(folder: &Path) -> Result<HashSet<String>> {
    let mut names: Vec<String> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    if let Some(latest) = names.pop() {
        let path: PathBuf = folder.join(&latest);
        info!(file = %path.display(), "Removing latest local extract before resync");
        fs::remove_file(&path).with_context(|| format!("cannot remove {}", path.display()))?;
    }

    Ok(names.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>crowding.data.tfl.gov.uk</Name>
  <Prefix>Network Demand/</Prefix>
  <Contents><Key>Network Demand/</Key><Size>0</Size></Contents>
  <Contents><Key>Network Demand/StationFootfall_2023.csv</Key><Size>10</Size></Contents>
  <Contents><Key>Network Demand/StationFootfall_2024_2025.csv</Key><Size>10</Size></Contents>
  <Contents><Key>Network Demand/Readme.pdf</Key><Size>10</Size></Contents>
  <Contents><Key>Network Demand/StationFootfall_notes.txt</Key><Size>10</Size></Contents>
  <Contents><Key>index.html</Key><Size>10</Size></Contents>
</ListBucketResult>"#;

    #[test]
    fn test_parse_listing_skips_folders_and_index() {
        let keys = parse_listing(LISTING).unwrap();
        assert_eq!(
            keys,
            vec![
                "Network Demand/StationFootfall_2023.csv",
                "Network Demand/StationFootfall_2024_2025.csv",
                "Network Demand/Readme.pdf",
                "Network Demand/StationFootfall_notes.txt",
            ]
        );
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert!(parse_listing("not xml <<").is_err());
    }

    #[test]
    fn test_select_candidates() {
        let keys = parse_listing(LISTING).unwrap();
        let source = FootfallSource::default();
        let names: Vec<_> = source
            .select_candidates(&keys)
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(
            names,
            vec!["StationFootfall_2023.csv", "StationFootfall_2024_2025.csv"]
        );
    }

    #[test]
    fn test_urls() {
        let source = FootfallSource::default();
        assert_eq!(
            source.listing_url(),
            "https://s3-eu-west-1.amazonaws.com/crowding.data.tfl.gov.uk/?list-type=2&max-keys=1000&prefix=Network%20Demand%2F"
        );
        assert_eq!(
            source.download_url("Network Demand/StationFootfall_2023.csv"),
            "https://crowding.data.tfl.gov.uk/Network%20Demand/StationFootfall_2023.csv"
        );
    }

    #[test]
    fn test_remove_latest_local() {
        let folder = env::temp_dir().join("station_crowding_test_sync_folder");
        let _ = fs::remove_dir_all(&folder);
        fs::create_dir_all(&folder).unwrap();
        for name in ["StationFootfall_2023.csv", "StationFootfall_2024_2025.csv"] {
            fs::write(folder.join(name), "date,weekday,station,entries,exits\n").unwrap();
        }

        let remaining = remove_latest_local(&folder).unwrap();

        assert!(remaining.contains("StationFootfall_2023.csv"));
        assert!(!folder.join("StationFootfall_2024_2025.csv").exists());
        fs::remove_dir_all(&folder).unwrap();
    }
}
