mod bundle;
mod hashing;
mod pending;
mod prefab;
mod provisioner;

pub use bundle::{decode_bundle, encode_bundle, AssetPackage, BundleError};
pub use pending::PendingBundle;
pub use prefab::{PrefabAsset, PrefabNode};
pub use provisioner::{AssetProvisioner, BundleSource, LoadMode, ProvisionError};
