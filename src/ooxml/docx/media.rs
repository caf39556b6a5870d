//! Content-addressed store for embedded media.
//!
//! Media is keyed by a CRC-32 of its bytes. Items sharing a checksum are
//! compared byte for byte, so two distinct blobs that happen to collide are
//! still kept apart while identical blobs are stored once.

use crate::ooxml::docx::format::PictureFormat;
use crate::ooxml::error::Result;
use crate::ooxml::opc::PackURI;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Stable identity of a stored media item within one [`ContentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(usize);

impl MediaId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A media blob and the package part that holds it.
#[derive(Debug, Clone)]
pub struct MediaItem {
    checksum: u32,
    format: PictureFormat,
    data: Arc<[u8]>,
    partname: PackURI,
}

impl MediaItem {
    pub fn new(data: Arc<[u8]>, format: PictureFormat, partname: PackURI) -> Self {
        Self {
            checksum: checksum(&data),
            format,
            data,
            partname,
        }
    }

    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    #[inline]
    pub fn format(&self) -> PictureFormat {
        self.format
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }
}

/// Outcome of [`ContentStore::intern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interned {
    /// Identical bytes were already stored
    Existing(MediaId),
    /// The bytes were stored as a new item
    New(MediaId),
}

impl Interned {
    #[inline]
    pub fn id(&self) -> MediaId {
        match *self {
            Interned::Existing(id) | Interned::New(id) => id,
        }
    }

    #[inline]
    pub fn is_new(&self) -> bool {
        matches!(self, Interned::New(_))
    }
}

#[derive(Debug, Default)]
pub struct ContentStore {
    buckets: HashMap<u32, SmallVec<[MediaId; 2]>>,
    items: Vec<MediaItem>,
}

/// CRC-32 over the whole blob.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the item holding these bytes, storing them first if needed.
    ///
    /// `partname_for` is only called when a new item is created and names
    /// the part the bytes will live in.
    pub fn intern<F>(&mut self, data: Arc<[u8]>, format: PictureFormat, partname_for: F) -> Result<Interned>
    where
        F: FnOnce(PictureFormat) -> Result<PackURI>,
    {
        let sum = checksum(&data);
        if let Some(id) = self.find_with_checksum(sum, &data) {
            return Ok(Interned::Existing(id));
        }

        let partname = partname_for(format)?;
        let id = self.push(MediaItem {
            checksum: sum,
            format,
            data,
            partname,
        });
        Ok(Interned::New(id))
    }

    /// Add an item without checking for an identical one.
    pub fn register(&mut self, item: MediaItem) -> MediaId {
        self.push(item)
    }

    /// Stored item with exactly these bytes.
    pub fn find(&self, data: &[u8]) -> Option<MediaId> {
        self.find_with_checksum(checksum(data), data)
    }

    pub fn find_by_partname(&self, partname: &PackURI) -> Option<MediaId> {
        self.items
            .iter()
            .position(|item| &item.partname == partname)
            .map(MediaId)
    }

    #[inline]
    pub fn get(&self, id: MediaId) -> Option<&MediaItem> {
        self.items.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaId, &MediaItem)> {
        self.items.iter().enumerate().map(|(i, item)| (MediaId(i), item))
    }

    /// Number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find_with_checksum(&self, sum: u32, data: &[u8]) -> Option<MediaId> {
        self.buckets
            .get(&sum)?
            .iter()
            .copied()
            .find(|id| self.items[id.0].data.as_ref() == data)
    }

    fn push(&mut self, item: MediaItem) -> MediaId {
        let id = MediaId(self.items.len());
        self.buckets.entry(item.checksum).or_default().push(id);
        self.items.push(item);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn media_name(store: &ContentStore) -> impl FnOnce(PictureFormat) -> Result<PackURI> + '_ {
        move |format| {
            Ok(PackURI::new(format!(
                "/word/media/image{}.{}",
                store.len() + 1,
                format.extension()
            ))?)
        }
    }

    #[test]
    fn test_intern_same_blob_twice() {
        let mut store = ContentStore::new();
        let blob: Arc<[u8]> = Arc::from(&b"0123456789"[..]);

        let name = PackURI::new("/word/media/image1.png").unwrap();
        let first = store
            .intern(blob.clone(), PictureFormat::Png, |_| Ok(name.clone()))
            .unwrap();
        let second = store
            .intern(Arc::from(&b"0123456789"[..]), PictureFormat::Png, |_| {
                panic!("no new part for known bytes")
            })
            .unwrap();

        assert!(first.is_new());
        assert_eq!(second, Interned::Existing(first.id()));
        assert_eq!(store.len(), 1);
        let item = store.get(first.id()).unwrap();
        assert_eq!(item.checksum(), checksum(&blob));
        assert_eq!(item.partname(), &name);
    }

    #[test]
    fn test_register_skips_dedup() {
        let mut store = ContentStore::new();
        let data: Arc<[u8]> = Arc::from(&b"abc"[..]);
        let a = store.register(MediaItem::new(
            data.clone(),
            PictureFormat::Gif,
            PackURI::new("/word/media/image1.gif").unwrap(),
        ));
        let b = store.register(MediaItem::new(
            data.clone(),
            PictureFormat::Gif,
            PackURI::new("/word/media/image2.gif").unwrap(),
        ));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find(b"abc"), Some(a));
        assert_eq!(
            store.find_by_partname(&PackURI::new("/word/media/image2.gif").unwrap()),
            Some(b)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_equal_bytes_share_identity(blobs in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..24)) {
            let mut store = ContentStore::new();
            let mut seen: HashMap<Vec<u8>, MediaId> = HashMap::new();
            for blob in blobs {
                let naming = media_name(&store);
                let partname = naming(PictureFormat::Png).unwrap();
                let interned = store
                    .intern(Arc::from(blob.clone()), PictureFormat::Png, move |_| Ok(partname))
                    .unwrap();
                let id = *seen.entry(blob).or_insert(interned.id());
                prop_assert_eq!(id, interned.id());
            }
            prop_assert_eq!(store.len(), seen.len());
        }
    }
}
