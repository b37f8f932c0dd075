//! Work items and their on-disk layout

use crate::DiscoError;
use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kinds of items the pipeline knows how to process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// `page:<search term>`: discover every result page for the term
    Page,
}

/// An item name as handed out by the tracker, split into kind and value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub name: String,
    pub kind: ItemKind,
    pub value: String,
}

impl WorkItem {
    /// Parses `<type>:<value>`; only `page` items are supported
    ///
    /// # Example
    ///
    /// ```
    /// use search_disco::pipeline::{ItemKind, WorkItem};
    ///
    /// let item = WorkItem::parse("page:gh").unwrap();
    /// assert_eq!(item.kind, ItemKind::Page);
    /// assert_eq!(item.value, "gh");
    /// ```
    pub fn parse(name: &str) -> Result<Self, DiscoError> {
        let (kind, value) = name
            .split_once(':')
            .ok_or_else(|| DiscoError::UnsupportedItem(name.to_string()))?;

        let kind = match kind {
            "page" => ItemKind::Page,
            _ => return Err(DiscoError::UnsupportedItem(name.to_string())),
        };

        if value.is_empty() {
            return Err(DiscoError::UnsupportedItem(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            kind,
            value: value.to_string(),
        })
    }
}

/// Directory and file names used while processing one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPaths {
    /// Shared directory finished files are moved into
    pub data_dir: PathBuf,

    /// Scratch directory of this item
    pub item_dir: PathBuf,

    /// File name stem shared by everything this item produces
    pub file_base: String,
}

impl ItemPaths {
    /// Computes the layout for an item without touching the filesystem
    pub fn new(data_dir: &Path, prefix: &str, item_name: &str, started: NaiveDateTime) -> Self {
        let file_base = format!(
            "{}-{}-{}",
            prefix,
            item_name.replace(':', "_"),
            started.format("%Y%m%d-%H%M%S")
        );

        Self {
            data_dir: data_dir.to_path_buf(),
            item_dir: data_dir.join(item_name),
            file_base,
        }
    }

    /// Creates a fresh, empty item directory, removing any leftover one
    pub fn prepare(&self) -> io::Result<()> {
        if self.item_dir.is_dir() {
            fs::remove_dir_all(&self.item_dir)?;
        }
        fs::create_dir_all(&self.item_dir)
    }

    /// Where the discover subprocess writes its records
    pub fn output_path(&self) -> PathBuf {
        self.item_dir.join(format!("{}.txt.gz", self.file_base))
    }

    /// Where the finished record file waits for upload
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.txt.gz", self.file_base))
    }

    /// Moves the record file into the data directory and drops the item directory
    pub fn move_files(&self) -> io::Result<PathBuf> {
        let target = self.data_path();
        fs::rename(self.output_path(), &target)?;
        fs::remove_dir_all(&self.item_dir)?;
        Ok(target)
    }
}
