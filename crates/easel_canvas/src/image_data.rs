//! Pixel buffers exchanged with `getImageData` / `putImageData`.

use serde::{Deserialize, Serialize};

/// RGBA pixel data of a rectangular canvas region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Row-major RGBA bytes, four per pixel
    #[serde(with = "indexed_bytes")]
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Transparent black buffer of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize * 4])
    }

    /// RGBA of one pixel, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let rgba = self.data.get(offset..offset + 4)?;
        Some([rgba[0], rgba[1], rgba[2], rgba[3]])
    }
}

/// Byte buffers as index-keyed maps: `{"0": 255, "1": 0, ...}`.
///
/// This is how typed byte arrays cross the channel. Decoding orders bytes by numeric index
/// and also accepts a plain array.
pub mod indexed_bytes {
    use serde::de::{self, MapAccess, SeqAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(bytes.len()))?;
        for (index, byte) in bytes.iter().enumerate() {
            map.serialize_entry(&index.to_string(), byte)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_any(IndexedBytesVisitor)
    }

    struct IndexedBytesVisitor;

    impl<'de> Visitor<'de> for IndexedBytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an index-keyed map of bytes or a byte array")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Vec<u8>, A::Error> {
            let mut entries: Vec<(usize, u8)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, byte)) = access.next_entry::<String, u8>()? {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| de::Error::custom(format!("non-numeric byte index `{key}`")))?;
                entries.push((index, byte));
            }
            entries.sort_unstable_by_key(|(index, _)| *index);
            Ok(entries.into_iter().map(|(_, byte)| byte).collect())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Vec<u8>, A::Error> {
            let mut bytes = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(byte) = access.next_element::<u8>()? {
                bytes.push(byte);
            }
            Ok(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_encodes_as_indexed_map() {
        let image = ImageData::new(1, 1, vec![255, 0, 128, 255]);
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(
            value,
            json!({
                "width": 1,
                "height": 1,
                "data": { "0": 255, "1": 0, "2": 128, "3": 255 }
            })
        );
    }

    #[test]
    fn test_decoding_orders_by_numeric_index() {
        let mut data = serde_json::Map::new();
        for index in (0..12).rev() {
            data.insert(index.to_string(), json!(index));
        }
        let image: ImageData =
            serde_json::from_value(json!({ "width": 3, "height": 1, "data": data })).unwrap();

        assert_eq!(image.data, (0..12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_decoding_accepts_plain_arrays_and_missing_size() {
        let image: ImageData = serde_json::from_value(json!({ "data": [1, 2, 3, 4] })).unwrap();
        assert_eq!(image.data, vec![1, 2, 3, 4]);
        assert_eq!((image.width, image.height), (0, 0));
    }

    #[test]
    fn test_decoding_rejects_bad_keys() {
        let result = serde_json::from_value::<ImageData>(json!({ "data": { "x": 1 } }));
        assert!(result.is_err());
    }

    #[test]
    fn test_pixel_lookup() {
        let mut image = ImageData::blank(2, 2);
        image.data[12..16].copy_from_slice(&[9, 8, 7, 6]);

        assert_eq!(image.pixel(1, 1), Some([9, 8, 7, 6]));
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(2, 0), None);
    }
}
