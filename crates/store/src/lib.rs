//! Persistence for the site builder: the object storage seam, page
//! documents and site settings, uploaded assets and cache invalidation.

pub mod assets;
pub mod delivery;
pub mod fs;
pub mod layout;
pub mod pages;
pub mod storage;

pub use assets::{AssetInfo, AssetStore, AssetUploader, UploadedAsset};
pub use delivery::{
    CacheInvalidator, DeliveryError, LogInvalidator, NoopInvalidator, RecordingInvalidator,
};
pub use fs::FsStorage;
pub use pages::{PageSeed, PageStore};
pub use storage::{MemoryStorage, ObjectInfo, ObjectStorage, StorageError, StorageResult};
