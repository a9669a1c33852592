use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::hashing::{sha256_bytes, to_hex_lower};
use super::prefab::PrefabAsset;

const MAGIC: &[u8; 4] = b"MNRB";
pub(crate) const BUNDLE_FORMAT_VERSION: u16 = 1;

/// A decoded bundle: a named set of prefab assets.
#[derive(Debug, Clone)]
pub struct AssetPackage {
    name: String,
    payload_hash_sha256_hex: String,
    assets: BTreeMap<String, Arc<PrefabAsset>>,
}

impl AssetPackage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_hash_sha256_hex(&self) -> &str {
        &self.payload_hash_sha256_hex
    }

    pub fn asset(&self, name: &str) -> Option<Arc<PrefabAsset>> {
        self.assets.get(name).cloned()
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle {origin} has invalid format: {message}")]
    InvalidFormat { origin: String, message: String },
    #[error("bundle {origin} asset '{asset}' could not be decoded: {source}")]
    AssetBody {
        origin: String,
        asset: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_bundle(name: &str, assets: &[PrefabAsset]) -> Result<Vec<u8>, BundleError> {
    let origin = format!("'{name}'");
    let mut sorted = assets.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut payload = Vec::<u8>::new();
    for asset in &sorted {
        let body = serde_json::to_vec(asset).map_err(|source| BundleError::AssetBody {
            origin: origin.clone(),
            asset: asset.name.clone(),
            source,
        })?;
        write_string(&mut payload, &asset.name, &origin)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| invalid_format(&origin, "asset body too large"))?;
        payload.extend_from_slice(&body_len.to_le_bytes());
        payload.extend_from_slice(&body);
    }

    let mut bytes = Vec::<u8>::new();
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
    write_string(&mut bytes, name, &origin)?;
    bytes.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| invalid_format(&origin, "payload too large"))?;
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&sha256_bytes(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decodes a whole in-memory bundle. `origin` only labels errors.
pub fn decode_bundle(bytes: &[u8], origin: &str) -> Result<AssetPackage, BundleError> {
    let mut reader = ByteReader::new(bytes, origin);

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(invalid_format(origin, "invalid magic"));
    }
    let version = reader.u16_le()?;
    if version != BUNDLE_FORMAT_VERSION {
        return Err(invalid_format(
            origin,
            &format!("unsupported bundle version {version}"),
        ));
    }
    let name = reader.short_string()?;
    let asset_count = reader.u32_le()? as usize;
    let payload_len = reader.u32_le()? as usize;
    let expected_hash = reader.take(32)?;
    let payload = reader.take(payload_len)?;
    reader.finish("unexpected trailing bytes")?;

    let actual_hash = sha256_bytes(payload);
    if expected_hash != actual_hash {
        return Err(invalid_format(origin, "payload hash mismatch"));
    }

    let assets = decode_payload(payload, asset_count, origin)?;
    Ok(AssetPackage {
        name,
        payload_hash_sha256_hex: to_hex_lower(&actual_hash),
        assets,
    })
}

fn decode_payload(
    payload: &[u8],
    expected_count: usize,
    origin: &str,
) -> Result<BTreeMap<String, Arc<PrefabAsset>>, BundleError> {
    let mut reader = ByteReader::new(payload, origin);
    let mut assets = BTreeMap::new();
    for _ in 0..expected_count {
        let asset_name = reader.short_string()?;
        let body_len = reader.u32_le()? as usize;
        let body = reader.take(body_len)?;
        let asset = serde_json::from_slice::<PrefabAsset>(body).map_err(|source| {
            BundleError::AssetBody {
                origin: origin.to_string(),
                asset: asset_name.clone(),
                source,
            }
        })?;
        if asset.name != asset_name {
            return Err(invalid_format(
                origin,
                &format!("asset entry '{asset_name}' holds prefab '{}'", asset.name),
            ));
        }
        if assets.insert(asset_name.clone(), Arc::new(asset)).is_some() {
            return Err(invalid_format(
                origin,
                &format!("duplicate asset '{asset_name}'"),
            ));
        }
    }
    reader.finish("payload length mismatch")?;
    Ok(assets)
}

fn write_string(target: &mut Vec<u8>, value: &str, origin: &str) -> Result<(), BundleError> {
    let len = u16::try_from(value.len())
        .map_err(|_| invalid_format(origin, "name longer than a u16 length prefix"))?;
    target.extend_from_slice(&len.to_le_bytes());
    target.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Little-endian reads over a borrowed buffer.
struct ByteReader<'a> {
    rest: &'a [u8],
    origin: &'a str,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8], origin: &'a str) -> Self {
        Self {
            rest: bytes,
            origin,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BundleError> {
        if len > self.rest.len() {
            return Err(invalid_format(self.origin, "unexpected end of data"));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BundleError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16_le(&mut self) -> Result<u16, BundleError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32_le(&mut self) -> Result<u32, BundleError> {
        self.array().map(u32::from_le_bytes)
    }

    fn short_string(&mut self) -> Result<String, BundleError> {
        let len = usize::from(self.u16_le()?);
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| invalid_format(self.origin, "name is not valid UTF-8"))
    }

    fn finish(&self, message: &str) -> Result<(), BundleError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(invalid_format(self.origin, message))
        }
    }
}

fn invalid_format(origin: &str, message: &str) -> BundleError {
    BundleError::InvalidFormat {
        origin: origin.to_string(),
        message: message.to_string(),
    }
}
